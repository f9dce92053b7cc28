mod registro;
mod user;

pub use registro::{Column, HistorialItem, Registro, RegistroInput, RegistroUpdate};
pub use user::{Credentials, LoginResponse, Role, User};
