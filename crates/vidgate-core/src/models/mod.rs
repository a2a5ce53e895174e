pub mod grant;
pub mod upload_session;
pub mod video;

pub use grant::SignedGrant;
pub use upload_session::{NewUploadSession, SessionStatus, TransportKind, UploadSession};
pub use video::{VideoRecord, VideoRecordResponse, VideoStatus};
