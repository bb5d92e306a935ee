pub mod asset;
pub mod error;
pub mod manifest;
pub mod operation;
pub mod progress;
pub mod scene;
pub mod settings;
pub mod traits;

pub mod prelude {
    pub use super::asset::*;
    pub use super::error::*;
    pub use super::manifest::*;
    pub use super::operation::*;
    pub use super::progress::*;
    pub use super::scene::*;
    pub use super::settings::*;
    pub use super::traits::*;
}
