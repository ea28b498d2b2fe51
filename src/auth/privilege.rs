use async_trait::async_trait;

use crate::datatable::{AccessCheck, AccessDenied, Action, Caller, Context, DataTableRequest, RowModel};

/// Access check requiring one named privilege to read and another to write.
///
/// Callers holding `root` pass every check; anonymous callers pass none.
#[derive(Debug, Clone)]
pub struct RequirePrivilege {
    read: &'static str,
    write: &'static str,
}

impl RequirePrivilege {
    pub fn new(read: &'static str, write: &'static str) -> Self {
        Self { read, write }
    }

    /// Same privilege for every action.
    pub fn any(privilege: &'static str) -> Self {
        Self::new(privilege, privilege)
    }

    pub fn required_for(&self, action: Action) -> &'static str {
        if action.is_mutation() {
            self.write
        } else {
            self.read
        }
    }

    pub fn authorize(&self, action: Action, caller: &Caller) -> Result<(), AccessDenied> {
        let user = caller
            .user
            .as_ref()
            .ok_or_else(|| AccessDenied::new("Authentication required"))?;

        let required = self.required_for(action);
        if user.has_privilege(required) {
            Ok(())
        } else {
            Err(AccessDenied::new(format!("Missing privilege '{}' for {}", required, action)))
        }
    }
}

#[async_trait]
impl<R: RowModel, C: Context> AccessCheck<R, C> for RequirePrivilege {
    async fn check(&self, _request: &DataTableRequest<R, C>, action: Action, caller: &Caller) -> Result<(), AccessDenied> {
        self.authorize(action, caller)
    }
}
