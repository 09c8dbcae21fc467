pub mod app_config;
pub mod attachments;
pub mod database;
pub mod seed;
pub mod ticket_repo;

pub use attachments::AttachmentStore;
pub use database::DbClient;
pub use ticket_repo::SqliteTicketRepository;
