pub mod modular;
pub mod ntt;
pub mod poly;
pub mod rns;

pub use modular::{mod_add, mod_mul, mod_neg, mod_sub};
pub use ntt::{make_plan, NttBackend};
pub use poly::CoeffPoly;
pub use rns::{Domain, RnsBasis, RnsPoly};
