//! Full-state query burst written after every connect

use anthem_protocol::{Command, CommandCode, Result, ZoneNumber};

/// Lines that bring a possibly stale store back in line with the receiver
///
/// Echo is disabled first so the receiver does not mirror our own queries,
/// and standby IP control is enabled so the socket survives power-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncPlan {
    zone_count: u8,
}

impl ResyncPlan {
    pub fn new(zone_count: u8) -> Self {
        Self { zone_count }
    }

    pub fn commands(&self) -> Vec<Command> {
        let mut commands = vec![
            Command::Echo(false),
            Command::StandbyIpControl(true),
            Command::DeviceQuery(CommandCode::Model),
            Command::DeviceQuery(CommandCode::InputCount),
        ];

        for zone in ZoneNumber::up_to(self.zone_count) {
            commands.extend(Command::zone_queries(zone));
        }

        commands
    }

    /// Encoded lines, terminators included
    pub fn lines(&self) -> Result<Vec<String>> {
        self.commands().iter().map(Command::to_line).collect()
    }
}
