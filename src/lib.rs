pub use satchel_core::*;

pub mod runtime {
    pub use satchel_runtime::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use satchel_fs::*;
}

#[cfg(feature = "remote")]
pub mod remote {
    pub use satchel_client::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use satchel_mock::*;
}

pub mod prelude {
    pub use satchel_core::prelude::*;
    pub use satchel_runtime::prelude::*;

    #[cfg(feature = "fs")]
    pub use satchel_fs::LocalProvider;

    #[cfg(feature = "remote")]
    pub use satchel_client::RemoteProvider;

    #[cfg(feature = "mock")]
    pub use satchel_mock::{MockFailure, MockProvider};
}
