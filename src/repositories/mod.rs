pub(crate) mod progress;
pub(crate) mod sentences;
pub(crate) mod users;
pub(crate) mod vocabulary;
