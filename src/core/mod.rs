// Domain-layer modules and shared errors/models
pub mod classifier {
    pub use crate::classifier::*;
}

pub mod lead_capture {
    pub use crate::lead_capture::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod sanitize {
    pub use crate::sanitize::*;
}

pub mod storage {
    pub use crate::storage::*;
}

pub mod errors {
    pub use crate::errors::*;
}
