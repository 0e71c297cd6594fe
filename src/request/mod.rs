mod draft;
mod request;
mod status;

pub use draft::{Location, RequestDraft, UNESTIMATED_FARE};
pub use request::{Request, RequestRecord};
pub use status::RequestStatus;
