use crate::errors::ChannelError;
use crate::hardware::connector::Connector;
use crate::shared_data::{Axis, Lane, LightColor};
use log::{info, warn};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// One point-in-time instruction for the board. Nothing is kept after it is
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Single { lane: Lane, color: LightColor },
    Paired { lanes: (Lane, Lane), color: LightColor },
}

impl Command {
    /// Paired command for both lights of an axis.
    pub fn for_axis(axis: Axis, color: LightColor) -> Self {
        Command::Paired {
            lanes: axis.lanes(),
            color,
        }
    }

    /// Wire form: `S1:GREEN\n` or `S1:S4:GREEN\n`.
    pub fn encode(&self) -> String {
        match self {
            Command::Single { lane, color } => format!("{}:{}\n", lane, color),
            Command::Paired {
                lanes: (a, b),
                color,
            } => format!("{}:{}:{}\n", a, b, color),
        }
    }

    /// Short form for the log feed, e.g. `S1 & S4 GREEN`.
    pub fn describe(&self) -> String {
        match self {
            Command::Single { lane, color } => format!("{} {}", lane, color),
            Command::Paired {
                lanes: (a, b),
                color,
            } => format!("{} & {} {}", a, b, color),
        }
    }
}

/// Write-only line protocol to the signal board over one persistent link.
///
/// The channel has a single owner (the controller worker). A send on a
/// missing or broken link reconnects once inline; if that fails too the
/// command is dropped and the error handed back. There is no retry queue.
pub struct CommandChannel<C: Connector> {
    connector: C,
    link: Option<C::Link>,
    reconnect_settle: Duration,
}

impl<C: Connector> CommandChannel<C> {
    /// Opens the link and waits `settle` for the board to come up. Failing
    /// here is fatal for the controller.
    pub fn open(
        mut connector: C,
        settle: Duration,
        reconnect_settle: Duration,
    ) -> Result<Self, ChannelError> {
        let target = connector.target();
        let link = connector
            .connect()
            .map_err(|source| ChannelError::Connect {
                target: target.clone(),
                source,
            })?;
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        info!("Connected to signal board on {}", target);
        Ok(Self {
            connector,
            link: Some(link),
            reconnect_settle,
        })
    }

    pub fn target(&self) -> String {
        self.connector.target()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn send(&mut self, lane: Lane, color: LightColor) -> Result<(), ChannelError> {
        self.send_command(&Command::Single { lane, color })
    }

    pub fn send_paired(
        &mut self,
        lane1: Lane,
        lane2: Lane,
        color: LightColor,
    ) -> Result<(), ChannelError> {
        self.send_command(&Command::Paired {
            lanes: (lane1, lane2),
            color,
        })
    }

    /// Writes one command. `Ok` means the bytes left this process; the board
    /// never acknowledges anything.
    pub fn send_command(&mut self, command: &Command) -> Result<(), ChannelError> {
        let line = command.encode();

        if let Some(link) = self.link.as_mut() {
            match write_line(link, &line) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Write to {} failed: {}", self.connector.target(), e);
                    self.link = None;
                }
            }
        }

        let link = self.reconnect()?;
        if let Err(source) = write_line(link, &line) {
            self.link = None;
            return Err(ChannelError::Send {
                target: self.connector.target(),
                source,
            });
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<&mut C::Link, ChannelError> {
        let target = self.connector.target();
        warn!("Link to {} not available, reconnecting", target);
        let link = self
            .connector
            .connect()
            .map_err(|source| ChannelError::Connect {
                target: target.clone(),
                source,
            })?;
        if !self.reconnect_settle.is_zero() {
            thread::sleep(self.reconnect_settle);
        }
        info!("Reconnected to {}", target);
        Ok(self.link.insert(link))
    }

    /// Flushes and releases the link.
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.flush() {
                warn!("Flush on close failed: {}", e);
            }
            info!("Closed link to {}", self.connector.target());
        }
    }
}

impl<C: Connector> Drop for CommandChannel<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_line<W: Write>(link: &mut W, line: &str) -> io::Result<()> {
    link.write_all(line.as_bytes())?;
    link.flush()
}
