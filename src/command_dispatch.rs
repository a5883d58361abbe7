//! Purpose: Hold top-level CLI command dispatch for `brokeradm`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command emits exactly one JSON document on success.
//! Invariants: Helpers in `main.rs` remain the source of output and error formatting.

use super::*;
use brokeradm::api::{ExchangeDeclare, PolicyDefinition, QueueDeclare};

pub(super) fn dispatch_command(
    command: Command,
    connection: &ConnectionArgs,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    if let Command::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(shell, &mut cmd, "brokeradm", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    let client = connection.client()?;
    match command {
        Command::Completions { .. } => {}
        Command::Overview => emit_json(&to_dynamic(&client.overview()?)?, color_mode)?,
        Command::Vhosts => emit_json(&to_dynamic(&client.list_vhosts()?)?, color_mode)?,
        Command::Queue { command } => dispatch_queue(&client, command, color_mode)?,
        Command::Exchange { command } => dispatch_exchange(&client, command, color_mode)?,
        Command::Bindings { vhost } => {
            let bindings = client.list_bindings(vhost.as_deref())?;
            emit_json(&to_dynamic(&bindings)?, color_mode)?;
        }
        Command::Policy { command } => dispatch_policy(&client, command, color_mode)?,
        Command::Get { segments } => {
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            let value = client.get_json(&segments)?;
            emit_json(&value, color_mode)?;
        }
    }
    Ok(RunOutcome::ok())
}

fn dispatch_queue(
    client: &ManagementClient,
    command: QueueCommand,
    color_mode: ColorMode,
) -> Result<(), Error> {
    match command {
        QueueCommand::List { vhost } => {
            emit_json(&to_dynamic(&client.list_queues(vhost.as_deref())?)?, color_mode)
        }
        QueueCommand::Get { vhost, name } => {
            emit_json(&to_dynamic(&client.get_queue(&vhost, &name)?)?, color_mode)
        }
        QueueCommand::Declare {
            vhost,
            name,
            transient,
            auto_delete,
            arguments,
        } => {
            let arguments = match arguments {
                Some(text) => parse_object_arg("--arguments", &text)?,
                None => DynamicMap::new(),
            };
            let body = QueueDeclare {
                durable: !transient,
                auto_delete,
                arguments,
            };
            client.declare_queue(&vhost, &name, &body)?;
            emit_ack("declared", &vhost, &name, color_mode)
        }
        QueueCommand::Delete { vhost, name } => {
            client.delete_queue(&vhost, &name)?;
            emit_ack("deleted", &vhost, &name, color_mode)
        }
    }
}

fn dispatch_exchange(
    client: &ManagementClient,
    command: ExchangeCommand,
    color_mode: ColorMode,
) -> Result<(), Error> {
    match command {
        ExchangeCommand::List { vhost } => {
            emit_json(&to_dynamic(&client.list_exchanges(vhost.as_deref())?)?, color_mode)
        }
        ExchangeCommand::Get { vhost, name } => {
            emit_json(&to_dynamic(&client.get_exchange(&vhost, &name)?)?, color_mode)
        }
        ExchangeCommand::Declare {
            vhost,
            name,
            kind,
            transient,
            auto_delete,
            internal,
            arguments,
        } => {
            let mut body = ExchangeDeclare::new(kind);
            body.durable = !transient;
            body.auto_delete = auto_delete;
            body.internal = internal;
            if let Some(text) = arguments {
                body.arguments = parse_object_arg("--arguments", &text)?;
            }
            client.declare_exchange(&vhost, &name, &body)?;
            emit_ack("declared", &vhost, &name, color_mode)
        }
        ExchangeCommand::Delete { vhost, name } => {
            client.delete_exchange(&vhost, &name)?;
            emit_ack("deleted", &vhost, &name, color_mode)
        }
    }
}

fn dispatch_policy(
    client: &ManagementClient,
    command: PolicyCommand,
    color_mode: ColorMode,
) -> Result<(), Error> {
    match command {
        PolicyCommand::List { vhost } => {
            emit_json(&to_dynamic(&client.list_policies(vhost.as_deref())?)?, color_mode)
        }
        PolicyCommand::Get { vhost, name } => {
            emit_json(&to_dynamic(&client.get_policy(&vhost, &name)?)?, color_mode)
        }
        PolicyCommand::Put {
            vhost,
            name,
            pattern,
            definition,
            priority,
            apply_to,
        } => {
            if !matches!(apply_to.as_str(), "queues" | "exchanges" | "all") {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown --apply-to value: {apply_to}"))
                    .with_hint("Use one of: queues, exchanges, all."));
            }
            let mut body = PolicyDefinition::new(pattern, parse_object_arg("--definition", &definition)?);
            body.priority = priority;
            body.apply_to = apply_to;
            client.put_policy(&vhost, &name, &body)?;
            emit_ack("put", &vhost, &name, color_mode)
        }
        PolicyCommand::Delete { vhost, name } => {
            client.delete_policy(&vhost, &name)?;
            emit_ack("deleted", &vhost, &name, color_mode)
        }
    }
}
