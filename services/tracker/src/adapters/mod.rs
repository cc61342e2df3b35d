pub mod db;
pub mod mailer;
pub mod memory;

pub use db::PgStore;
pub use mailer::{LogSender, SmtpSender};
pub use memory::MemoryStore;
