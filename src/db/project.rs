use log::info;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::file::{attach_to_project, project_files, remove_record};
use crate::db::{now, StoreError};
use crate::record::project::{is_valid_project_name, Algorithms, NewProject, Project, ProjectStatus};

const COLUMNS: &str =
    "id, user_id, name, project_type, status, aligner, variant_caller, annotator, error, created_at";

fn from_row(row: &Row) -> rusqlite::Result<Project> {
    let status: String = row.get(4)?;
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        project_type: row.get(3)?,
        status: status
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        algorithms: Algorithms {
            aligner: row.get(5)?,
            variant_caller: row.get(6)?,
            annotator: row.get(7)?,
        },
        error: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a pending project and attach its files in one transaction
pub fn insert_project(conn: &mut Connection, project: &NewProject) -> Result<Project, StoreError> {
    if !is_valid_project_name(&project.name) {
        return Err(StoreError::Invalid(format!("project name {:?}", project.name)));
    }
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO project (user_id, name, project_type, status, aligner, variant_caller, annotator, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            project.user_id,
            project.name,
            project.project_type,
            ProjectStatus::Pending.as_str(),
            project.algorithms.aligner,
            project.algorithms.variant_caller,
            project.algorithms.annotator,
            now()
        ],
    )?;
    let id = tx.last_insert_rowid();
    for file_id in &project.file_ids {
        attach_to_project(&tx, *file_id, id, project.user_id)?;
    }
    let created = load_project(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
    tx.commit()?;
    info!("Created project {} ({}) with {} files", id, project.name, project.file_ids.len());
    Ok(created)
}

pub fn load_project(conn: &Connection, id: i64) -> Result<Option<Project>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM project WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

/// Compare-and-swap the project status
///
/// Moves the project to `to` only if its current status is one of `from`. Returns whether the
/// swap happened. Claiming a project for a run clears the previous failure message.
pub fn transition(
    conn: &Connection,
    id: i64,
    from: &[ProjectStatus],
    to: ProjectStatus,
) -> Result<bool, StoreError> {
    if from.is_empty() {
        return Ok(false);
    }
    let placeholders = vec!["?"; from.len()].join(", ");
    let sql = format!(
        "UPDATE project SET status = ?, error = CASE WHEN ? = 'in_progress' THEN NULL ELSE error END WHERE id = ? AND status IN ({placeholders})"
    );
    let mut values: Vec<Value> = vec![
        Value::Text(to.as_str().to_string()),
        Value::Text(to.as_str().to_string()),
        Value::Integer(id),
    ];
    values.extend(from.iter().map(|status| Value::Text(status.as_str().to_string())));

    let changed = conn.execute(&sql, params_from_iter(values))?;
    if changed == 1 {
        info!("Project {id} is now {to}");
    }
    Ok(changed == 1)
}

/// Mark a pending or running project as failed and keep the reason
pub fn fail_project(conn: &Connection, id: i64, reason: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE project SET status = ?1, error = ?2 WHERE id = ?3 AND status IN (?4, ?5)",
        params![
            ProjectStatus::Failed.as_str(),
            reason,
            id,
            ProjectStatus::Pending.as_str(),
            ProjectStatus::InProgress.as_str()
        ],
    )?;
    Ok(changed == 1)
}

/// Delete a project together with its job handles and attached files (bytes included)
pub fn delete_project(conn: &mut Connection, id: i64) -> Result<bool, StoreError> {
    let tx = conn.transaction()?;
    if load_project(&tx, id)?.is_none() {
        return Ok(false);
    }
    for file in project_files(&tx, id)? {
        remove_record(&tx, &file)?;
    }
    tx.execute("DELETE FROM job WHERE project_id = ?1", [id])?;
    tx.execute("DELETE FROM project WHERE id = ?1", [id])?;
    tx.commit()?;
    info!("Deleted project {id}");
    Ok(true)
}
