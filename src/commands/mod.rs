mod handlers;
mod parser;

pub use handlers::CommandHandler;
