//! Job handles link a project to the task id the worker handed back
//!
//! A project has at most one active handle. Recording a new handle (first submission or rerun)
//! marks every earlier handle of the project as superseded in the same transaction.

use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{now, StoreError};
use crate::record::project::JobHandle;

const COLUMNS: &str = "id, project_id, task_id, superseded, created_at";

fn from_row(row: &Row) -> rusqlite::Result<JobHandle> {
    Ok(JobHandle {
        id: row.get(0)?,
        project_id: row.get(1)?,
        task_id: row.get(2)?,
        superseded: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_job(conn: &mut Connection, project_id: i64, task_id: &str) -> Result<JobHandle, StoreError> {
    let tx = conn.transaction()?;
    let superseded = tx.execute(
        "UPDATE job SET superseded = 1 WHERE project_id = ?1 AND superseded = 0",
        [project_id],
    )?;
    tx.execute(
        "INSERT INTO job (project_id, task_id, created_at) VALUES (?1, ?2, ?3)",
        params![project_id, task_id, now()],
    )?;
    let id = tx.last_insert_rowid();
    let sql = format!("SELECT {COLUMNS} FROM job WHERE id = ?1");
    let handle = tx.query_row(&sql, [id], from_row)?;
    tx.commit()?;

    info!("Project {project_id} has task {task_id} ({superseded} earlier handles superseded)");
    Ok(handle)
}

pub fn active_job(conn: &Connection, project_id: i64) -> Result<Option<JobHandle>, StoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM job WHERE project_id = ?1 AND superseded = 0 ORDER BY id DESC LIMIT 1"
    );
    Ok(conn.query_row(&sql, [project_id], from_row).optional()?)
}

/// Every handle a project ever had, oldest first
pub fn job_history(conn: &Connection, project_id: i64) -> Result<Vec<JobHandle>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM job WHERE project_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([project_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<JobHandle>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open::open_in_memory;
    use crate::db::project::insert_project;
    use crate::record::project::{Algorithms, NewProject};

    #[test]
    fn rerun_supersedes_previous_handle() {
        let store = open_in_memory().unwrap();
        store
            .with(|conn| {
                let project = insert_project(
                    conn,
                    &NewProject {
                        user_id: 1,
                        name: "p".into(),
                        project_type: "GM".into(),
                        algorithms: Algorithms {
                            aligner: "bwa".into(),
                            variant_caller: "haplotypecaller".into(),
                            annotator: "vep".into(),
                        },
                        file_ids: vec![],
                    },
                )?;
                assert!(active_job(conn, project.id)?.is_none());

                let first = insert_job(conn, project.id, "task-a")?;
                let second = insert_job(conn, project.id, "task-b")?;

                assert_eq!(active_job(conn, project.id)?, Some(second.clone()));
                let history = job_history(conn, project.id)?;
                assert_eq!(history.len(), 2);
                assert_eq!(history[0].task_id, first.task_id);
                assert!(history[0].superseded);
                assert!(!history[1].superseded);
                Ok(())
            })
            .unwrap();
    }
}
