pub mod origin;
pub mod session;

pub use origin::RequestOrigin;
pub use session::SessionContext;
