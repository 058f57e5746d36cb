//! External service integrations.

pub mod crm_client {
    pub use crate::crm_client::*;
}

pub mod email_client {
    pub use crate::email_client::*;
}

pub mod sinks {
    pub use crate::sinks::*;
}
