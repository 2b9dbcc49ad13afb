//! Subcommand execution

use crate::cli::{ActorArgs, Cli, Command};
use crate::config::NodeConfig;
use crate::records::{RecordBackend, RecordFile};
use anyhow::{Context, Result};
use poamflow_authz::{AuthorityModel, Role};
use poamflow_core::RecordKey;
use poamflow_workflow::{
    Actor, ExceptionRequest, NewPoam, PoamRecord, PoamService, WorkflowStatus,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Run one CLI invocation, printing its result as JSON on stdout
pub async fn run(cli: Cli, config: NodeConfig) -> Result<()> {
    let authority = Arc::new(config.authority_model()?);

    match &cli.command {
        Command::Hierarchy => return print_json(&authority.approval_hierarchy()),
        Command::Permissions { role } => return print_json(&permissions(&authority, *role)),
        _ => {}
    }

    let backend = RecordBackend::open(&config, RecordFile::new(&cli.records)).await?;
    let service = PoamService::new(backend.store(), authority, config.service.clone());
    let tenant = cli.tenant.as_str();
    let key = |id: &str| RecordKey::new(tenant, id).context("Invalid record key");

    match cli.command {
        Command::Hierarchy | Command::Permissions { .. } => Ok(()),

        Command::Create {
            actor,
            title,
            risk,
            description,
            system,
            control,
            due,
        } => {
            let mut fields = NewPoam::new(title, risk.into()).with_description(description);
            if let Some(system) = system {
                fields = fields.with_system(system);
            }
            if let Some(control) = control {
                fields = fields.with_control(control);
            }
            if let Some(due) = due {
                fields = fields.with_scheduled_completion(due);
            }

            let record = service.create_record(tenant, fields, &actor.into_actor()).await?;
            mutated(&backend, &record).await
        }

        Command::Submit { id, actor, comments } => {
            let record = service
                .submit_for_approval(&key(&id)?, &actor.into_actor(), comments.as_deref())
                .await?;
            mutated(&backend, &record).await
        }

        Command::RequestException {
            id,
            actor,
            exception_type,
            justification,
            risk_acceptance,
            compensating_controls,
        } => {
            let request = ExceptionRequest {
                exception_type: exception_type.into(),
                justification,
                risk_acceptance_statement: risk_acceptance,
                compensating_controls,
            };
            let record = service
                .request_exception(&key(&id)?, &actor.into_actor(), request)
                .await?;
            mutated(&backend, &record).await
        }

        Command::Act {
            id,
            actor,
            action,
            delegate_to,
            comments,
        } => {
            let action = action.into_action(delegate_to);
            let record = service
                .process_approval_action(
                    &key(&id)?,
                    &action,
                    &actor.into_actor(),
                    comments.as_deref(),
                )
                .await?;
            mutated(&backend, &record).await
        }

        Command::Withdraw { id, actor, comments } => {
            let record = service
                .withdraw(&key(&id)?, &actor.into_actor(), comments.as_deref())
                .await?;
            mutated(&backend, &record).await
        }

        Command::Resubmit { id, actor, comments } => {
            let record = service
                .resubmit(&key(&id)?, &actor.into_actor(), comments.as_deref())
                .await?;
            mutated(&backend, &record).await
        }

        Command::Status { id } => {
            let status: WorkflowStatus = service.get_workflow_status(&key(&id)?).await?;
            print_json(&status)
        }

        Command::Show { id } => print_json(&service.get_record(&key(&id)?).await?),

        Command::Pending { role } => {
            print_json(&service.get_pending_approvals(role, tenant).await?)
        }

        Command::Stats => print_json(&service.get_statistics(tenant).await?),
    }
}

impl ActorArgs {
    fn into_actor(self) -> Actor {
        Actor::new(self.actor, self.role)
    }
}

/// Role definition plus derived abilities
pub fn permissions(authority: &AuthorityModel, role: Role) -> serde_json::Value {
    let definition = authority.definition(role);
    json!({
        "role": role,
        "description": definition.description,
        "approvalLevel": definition.approval_level,
        "canApproveExceptions": definition.can_approve_exceptions,
        "canDelegate": authority.can_delegate(role),
        "canEscalate": authority.can_escalate(role),
        "permissions": definition.permissions,
    })
}

async fn mutated(backend: &RecordBackend, record: &PoamRecord) -> Result<()> {
    backend.persist().await?;
    info!("{} is now {}", record.key(), record.status);
    print_json(record)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
