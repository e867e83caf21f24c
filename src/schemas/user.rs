use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::models::{DatasetStat, User};

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) name: String,
    pub(crate) student_id: String,
    pub(crate) color: String,
    pub(crate) is_admin: bool,
    pub(crate) sentence_stats: BTreeMap<String, DatasetStat>,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            name: user.name,
            student_id: user.student_id,
            color: user.color,
            is_admin: user.is_admin,
            sentence_stats: user.sentence_stats,
        }
    }
}
