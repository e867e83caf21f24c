pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod leaderboard;
pub(crate) mod router;
pub(crate) mod sentences;
pub(crate) mod upload;
pub(crate) mod validation;
pub(crate) mod vocabulary;
