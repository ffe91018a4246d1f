//! Parsing and execution of the `ctl` pseudo-file's command language, plus
//! the status line a `ctl` read produces.
//!
//! Grounded on `hubctl`/`getcmd`/`eofhub`: commands are whitespace
//! separated, the first word selects the verb, and most verbs take an
//! optional hub name (defaulting to "every hub" when omitted for the
//! ones where that makes sense).

use crate::config::ServerConfig;
use crate::error::HubError;
use crate::flags::ServerFlags;
use crate::hub::Hub;
use crate::registry::HubRegistry;

/// A single parsed `ctl` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtlCommand {
    /// Turns paranoid mode off, server-wide.
    Calm,
    /// Turns paranoid mode on, server-wide.
    Fear,
    /// Switches one hub (or, unnamed, every hub) into freeze mode.
    Freeze(Option<String>),
    /// Reverses `Freeze`.
    Melt(Option<String>),
    /// Switches one hub (or every hub) into trunc mode.
    Trunc(Option<String>),
    /// Reverses `Trunc`.
    NoTrunc(Option<String>),
    /// Broadcasts EOF on a named hub, or every hub if omitted.
    Eof(Option<String>),
    /// Shuts the server down.
    Quit,
}

/// Parses one line of `ctl` input.
///
/// Leading/trailing whitespace and repeated interior whitespace are
/// trimmed away before splitting, matching `getcmd`'s tokenizer.
pub fn parse(line: &str) -> Result<CtlCommand, HubError> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(HubError::BadCtl)?;
    let arg = words.next().map(str::to_string);
    if words.next().is_some() {
        return Err(HubError::BadCtl);
    }
    match verb {
        "calm" => Ok(CtlCommand::Calm),
        "fear" => Ok(CtlCommand::Fear),
        "freeze" => Ok(CtlCommand::Freeze(arg)),
        "melt" => Ok(CtlCommand::Melt(arg)),
        "trunc" => Ok(CtlCommand::Trunc(arg)),
        "notrunc" => Ok(CtlCommand::NoTrunc(arg)),
        "eof" => Ok(CtlCommand::Eof(arg)),
        "quit" => Ok(CtlCommand::Quit),
        _ => Err(HubError::BadCtl),
    }
}

/// What happened after a command ran successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlOutcome {
    Applied,
    ShouldQuit,
}

/// Applies a parsed command against the server's registry and flags.
pub async fn execute(cmd: CtlCommand, registry: &HubRegistry, flags: &ServerFlags) -> Result<CtlOutcome, HubError> {
    match cmd {
        CtlCommand::Calm => {
            flags.set_paranoid(false);
            Ok(CtlOutcome::Applied)
        }
        CtlCommand::Fear => {
            flags.set_paranoid(true);
            Ok(CtlOutcome::Applied)
        }
        CtlCommand::Freeze(name) => {
            if name.is_none() {
                flags.set_freeze(true);
            }
            set_on_targeted(registry, name, Toggle::Freeze, true).await
        }
        CtlCommand::Melt(name) => {
            if name.is_none() {
                flags.set_freeze(false);
            }
            set_on_targeted(registry, name, Toggle::Freeze, false).await
        }
        CtlCommand::Trunc(name) => {
            if name.is_none() {
                flags.set_trunc(true);
            }
            set_on_targeted(registry, name, Toggle::Trunc, true).await
        }
        CtlCommand::NoTrunc(name) => {
            if name.is_none() {
                flags.set_trunc(false);
            }
            set_on_targeted(registry, name, Toggle::Trunc, false).await
        }
        CtlCommand::Eof(Some(name)) => {
            let hub = registry.get(&name).ok_or(HubError::HubNotFound)?;
            hub.signal_eof().await;
            Ok(CtlOutcome::Applied)
        }
        CtlCommand::Eof(None) => {
            for name in registry.names() {
                if let Some(hub) = registry.get(name) {
                    hub.signal_eof().await;
                }
            }
            Ok(CtlOutcome::Applied)
        }
        CtlCommand::Quit => Ok(CtlOutcome::ShouldQuit),
    }
}

enum Toggle {
    Freeze,
    Trunc,
}

async fn apply_toggle(hub: &Hub, which: &Toggle, on: bool) {
    match which {
        Toggle::Freeze => hub.set_freeze(on).await,
        Toggle::Trunc => hub.set_trunc(on).await,
    }
}

/// Applies a boolean hub setter either to one named hub or to every hub
/// currently registered, matching the source's "no argument means all"
/// convention for `freeze`/`melt`/`trunc`/`notrunc`.
async fn set_on_targeted(
    registry: &HubRegistry,
    name: Option<String>,
    which: Toggle,
    on: bool,
) -> Result<CtlOutcome, HubError> {
    match name {
        Some(name) => {
            let hub = registry.get(&name).ok_or(HubError::HubNotFound)?;
            apply_toggle(&hub, &which, on).await;
        }
        None => {
            for name in registry.names() {
                if let Some(hub) = registry.get(name) {
                    apply_toggle(&hub, &which, on).await;
                }
            }
        }
    }
    Ok(CtlOutcome::Applied)
}

/// Renders the server-wide status line a read of the root `ctl` returns,
/// matching §6's literal template field-for-field, tab and all.
pub fn format_server_status(flags: &ServerFlags, config: &ServerConfig) -> String {
    format!(
        "\tHubfs {} status (1 is active, 0 is inactive):\nParanoia == {}  Freeze == {}  Trunc == {}  Applylimits == {}\nBuffersize == {}\n",
        config.srv_name,
        u8::from(flags.paranoid()),
        u8::from(flags.freeze()),
        u8::from(flags.trunc()),
        u8::from(config.applies_limits()),
        config.bucket_size,
    )
}
