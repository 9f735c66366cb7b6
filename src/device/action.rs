// Platform-invoked actions and queries, mapped 1:1 onto remote operations.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::commands::ContainerVerb;
use crate::error::ActionError;
use crate::models::{ActiveUser, ContainerRecord, GpioState};
use crate::remote_repo::RemoteRepo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PowerOff,
    Reboot,
    SystemUpdate,
    SetGpioOutput { pin: u8, high: bool },
    RunShellCommand { command: String },
    /// Optional id/name substring filter (autocomplete).
    ListContainers { query: Option<String> },
    StartContainer { id: String },
    StopContainer { id: String },
    RestartContainer { id: String },
    GpioIsHigh { pin: u8 },
    ListUsers,
}

#[derive(Deserialize)]
struct PinLevelArgs {
    pin: u8,
    high: bool,
}

#[derive(Deserialize)]
struct PinArgs {
    pin: u8,
}

#[derive(Deserialize)]
struct CommandArgs {
    command: String,
}

#[derive(Deserialize)]
struct ContainerArgs {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryArgs {
    #[serde(default)]
    query: Option<String>,
}

fn args<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, ActionError> {
    serde_json::from_value(value)
        .map_err(|e| ActionError::InvalidArgument(format!("{name}: {e}")))
}

impl Action {
    /// Builds an action from its snake_case name and JSON arguments.
    pub fn parse(name: &str, body: Value) -> Result<Self, ActionError> {
        let action = match name {
            "power_off" => Action::PowerOff,
            "reboot" => Action::Reboot,
            "system_update" => Action::SystemUpdate,
            "set_gpio_output" => {
                let a: PinLevelArgs = args(name, body)?;
                Action::SetGpioOutput {
                    pin: a.pin,
                    high: a.high,
                }
            }
            "run_shell_command" => Action::RunShellCommand {
                command: args::<CommandArgs>(name, body)?.command,
            },
            "list_containers" => {
                let a: QueryArgs = if body.is_null() {
                    QueryArgs::default()
                } else {
                    args(name, body)?
                };
                Action::ListContainers { query: a.query }
            }
            "start_container" => Action::StartContainer {
                id: args::<ContainerArgs>(name, body)?.id,
            },
            "stop_container" => Action::StopContainer {
                id: args::<ContainerArgs>(name, body)?.id,
            },
            "restart_container" => Action::RestartContainer {
                id: args::<ContainerArgs>(name, body)?.id,
            },
            "gpio_is_high" => Action::GpioIsHigh {
                pin: args::<PinArgs>(name, body)?.pin,
            },
            "list_users" => Action::ListUsers,
            other => {
                return Err(ActionError::InvalidArgument(format!(
                    "unknown action: {other}"
                )));
            }
        };
        Ok(action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::PowerOff => "power_off",
            Action::Reboot => "reboot",
            Action::SystemUpdate => "system_update",
            Action::SetGpioOutput { .. } => "set_gpio_output",
            Action::RunShellCommand { .. } => "run_shell_command",
            Action::ListContainers { .. } => "list_containers",
            Action::StartContainer { .. } => "start_container",
            Action::StopContainer { .. } => "stop_container",
            Action::RestartContainer { .. } => "restart_container",
            Action::GpioIsHigh { .. } => "gpio_is_high",
            Action::ListUsers => "list_users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionOutput {
    Done,
    Text(String),
    Level(bool),
    Containers(Vec<ContainerRecord>),
    Users(Vec<ActiveUser>),
}

/// Runs one action. GPIO queries answer from the last fast-poll result
/// instead of going to the device.
pub async fn handle_action(
    repo: &RemoteRepo,
    latest_gpio: &RwLock<Option<GpioState>>,
    action: Action,
) -> Result<ActionOutput, ActionError> {
    match action {
        Action::PowerOff => repo.power_off().await.map(|_| ActionOutput::Done),
        Action::Reboot => repo.reboot().await.map(|_| ActionOutput::Done),
        Action::SystemUpdate => repo.system_update().await.map(ActionOutput::Text),
        Action::SetGpioOutput { pin, high } => {
            repo.set_gpio(pin, high).await.map(|_| ActionOutput::Done)
        }
        Action::RunShellCommand { command } => {
            repo.run_command(&command).await.map(ActionOutput::Text)
        }
        Action::ListContainers { query } => {
            let mut containers = repo.get_containers().await?;
            if let Some(q) = query.as_deref().filter(|q| !q.is_empty()) {
                containers.retain(|c| c.matches(q));
            }
            Ok(ActionOutput::Containers(containers))
        }
        Action::StartContainer { id } => repo
            .container(ContainerVerb::Start, &id)
            .await
            .map(|_| ActionOutput::Done),
        Action::StopContainer { id } => repo
            .container(ContainerVerb::Stop, &id)
            .await
            .map(|_| ActionOutput::Done),
        Action::RestartContainer { id } => repo
            .container(ContainerVerb::Restart, &id)
            .await
            .map(|_| ActionOutput::Done),
        Action::GpioIsHigh { pin } => {
            let gpio = latest_gpio.read().await;
            gpio.as_ref()
                .and_then(|state| state.get(&pin))
                .map(|p| ActionOutput::Level(p.level))
                .ok_or(ActionError::StateUnknown(pin))
        }
        Action::ListUsers => repo.get_users().await.map(ActionOutput::Users),
    }
}
