//! MySQL-backed stored-procedure adapter.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Decode, Executor, Row, ValueRef};
use tracing::warn;

use crate::application::repos::{ProcedureError, ProcedureRepo};
use crate::config::DatabaseSettings;
use crate::domain::action::Action;
use crate::domain::result::QueryResult;

/// Opens one connection per request from the configured credentials and
/// unix-socket endpoint, issues exactly one CALL, and closes the connection
/// on success and failure alike.
pub struct MySqlProcedures {
    options: MySqlConnectOptions,
}

impl MySqlProcedures {
    pub fn new(settings: &DatabaseSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .socket(&settings.socket)
            .username(&settings.username)
            .password(&settings.password)
            .database(&settings.name);
        Self { options }
    }
}

#[async_trait]
impl ProcedureRepo for MySqlProcedures {
    async fn call(&self, action: &Action) -> Result<QueryResult, ProcedureError> {
        let mut connection = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(ProcedureError::connect)?;

        let outcome = invoke(&mut connection, action).await;

        // Close on both paths; a failed QUIT is not worth surfacing.
        if let Err(err) = connection.close().await {
            warn!(error = %err, "database connection close failed");
        }

        outcome
    }
}

async fn invoke(
    connection: &mut MySqlConnection,
    action: &Action,
) -> Result<QueryResult, ProcedureError> {
    // A routine name cannot be bound as a statement parameter, so the CALL
    // text is built from the already-validated action, backtick-quoted. The
    // statement goes over the text protocol: every cell then arrives as the
    // server's textual rendering, which `materialize` relies on.
    let statement = format!("CALL `{}`()", action.as_str());
    let rows = connection
        .fetch_all(statement.as_str())
        .await
        .map_err(ProcedureError::query)?;

    materialize(&rows)
}

/// Collect rows into a [`QueryResult`], preserving declared column order and
/// SQL NULLs. Only valid for text-protocol rows.
fn materialize(rows: &[MySqlRow]) -> Result<QueryResult, ProcedureError> {
    let mut result = QueryResult::default();

    for row in rows {
        if result.columns.is_empty() {
            result.columns = row
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();
        }

        let mut cells = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            let raw = row.try_get_raw(index).map_err(ProcedureError::result_set)?;
            if raw.is_null() {
                cells.push(None);
            } else {
                let text =
                    <&str as Decode<MySql>>::decode(raw).map_err(ProcedureError::result_set)?;
                cells.push(Some(text.to_string()));
            }
        }
        result.rows.push(cells);
    }

    Ok(result)
}
