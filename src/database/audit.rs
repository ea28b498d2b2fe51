use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::config;
use crate::datatable::{Caller, Context, DataTableRequest, Mutation, RowModel, WriteLog};

use super::query_builder::timed;

/// Which audit hook endpoint families are wired with.
#[derive(Clone)]
pub enum AuditLog {
    Disabled,
    Tracing,
    Postgres(PgPool),
}

impl AuditLog {
    /// Postgres when auditing is enabled and a pool exists, a tracing event
    /// when only auditing is enabled.
    pub fn from_config(pool: Option<&PgPool>) -> Self {
        if !config::config().security.enable_audit_logging {
            return AuditLog::Disabled;
        }
        match pool {
            Some(pool) => AuditLog::Postgres(pool.clone()),
            None => AuditLog::Tracing,
        }
    }

    pub fn hook<R: RowModel, C: Context>(&self, family: &'static str) -> Option<Arc<dyn WriteLog<R, C>>> {
        match self {
            AuditLog::Disabled => None,
            AuditLog::Tracing => Some(Arc::new(TracingAuditLog { family })),
            AuditLog::Postgres(pool) => Some(Arc::new(PgAuditLog {
                pool: pool.clone(),
                family,
            })),
        }
    }
}

/// Emits one `audit` target event per mutation.
pub struct TracingAuditLog {
    family: &'static str,
}

#[async_trait]
impl<R: RowModel, C: Context> WriteLog<R, C> for TracingAuditLog {
    async fn write_log(&self, request: &DataTableRequest<R, C>, mutation: Mutation, caller: &Caller) -> anyhow::Result<()> {
        tracing::info!(
            target: "audit",
            family = self.family,
            mutation = mutation.as_str(),
            user_id = ?caller.user_id(),
            row_id = ?request.row_id(),
            "data table mutation"
        );
        Ok(())
    }
}

/// Appends to `admin_audit_log`; the full validated request is stored as JSONB.
pub struct PgAuditLog {
    pool: PgPool,
    family: &'static str,
}

const INSERT_AUDIT: &str = "INSERT INTO \"admin_audit_log\" (\"family\", \"mutation\", \"user_id\", \"row_id\", \"request\") \
                            VALUES ($1, $2, $3, $4, $5)";

#[async_trait]
impl<R: RowModel, C: Context> WriteLog<R, C> for PgAuditLog {
    async fn write_log(&self, request: &DataTableRequest<R, C>, mutation: Mutation, caller: &Caller) -> anyhow::Result<()> {
        let payload = serde_json::to_value(request)?;

        let q = sqlx::query(INSERT_AUDIT)
            .bind(self.family)
            .bind(mutation.as_str())
            .bind(caller.user_id())
            .bind(request.row_id())
            .bind(payload);
        timed(INSERT_AUDIT, q.execute(&self.pool)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::DeleteRequest;
    use crate::testing::{Staff, StaffScope};

    #[tokio::test]
    async fn tracing_log_never_fails() {
        let log = AuditLog::Tracing.hook::<Staff, StaffScope>("staff").unwrap();
        let request = DataTableRequest::Delete(DeleteRequest {
            id: 4,
            context: StaffScope { team_id: 7 },
        });
        log.write_log(&request, Mutation::Deleted, &Caller::anonymous()).await.unwrap();
    }

    #[test]
    fn disabled_log_has_no_hook() {
        assert!(AuditLog::Disabled.hook::<Staff, StaffScope>("staff").is_none());
    }

    #[test]
    fn audited_request_serializes_with_action_tag() {
        let request: DataTableRequest<Staff, StaffScope> = DataTableRequest::Delete(DeleteRequest {
            id: 4,
            context: StaffScope { team_id: 7 },
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["action"], "delete");
        assert_eq!(value["id"], 4);
        assert_eq!(value["context"]["team_id"], 7);
    }
}
