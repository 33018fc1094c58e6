pub mod email;
pub mod render;

pub use email::{DigestMailer, MailError, MailErrorKind, SmtpMailer};
pub use render::{render_digest, RenderedDigest};
