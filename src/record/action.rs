use serde::Serialize;

/// The kind of record an action was logged for
///
/// Each kind carries its own short code and label so callers decide the label when they build
/// the action, not by inspecting the record afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Project,
    File,
    Report,
}

impl RecordKind {
    /// Two letter code stored in the `action_type` column
    pub fn code(&self) -> &'static str {
        match self {
            RecordKind::Project => "PC",
            RecordKind::File => "FU",
            RecordKind::Report => "RC",
        }
    }

    /// Human readable label sent to clients
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Project => "project_creation",
            RecordKind::File => "file_upload",
            RecordKind::Report => "report_creation",
        }
    }

    pub fn from_code(code: &str) -> Option<RecordKind> {
        [RecordKind::Project, RecordKind::File, RecordKind::Report]
            .into_iter()
            .find(|kind| kind.code() == code)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: i64,
    pub user_id: i64,
    /// label of the record kind, e.g. `file_upload`
    pub action_type: String,
    pub action_detail: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_carry_their_labels() {
        assert_eq!(RecordKind::Project.code(), "PC");
        assert_eq!(RecordKind::File.label(), "file_upload");
        assert_eq!(RecordKind::Report.label(), "report_creation");
        assert_eq!(RecordKind::from_code("RC"), Some(RecordKind::Report));
        assert_eq!(RecordKind::from_code("SI"), None);
    }
}
