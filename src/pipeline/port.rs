//! Port descriptors for the node system.
//!
//! Each node kind declares its ports (inputs/outputs) via static `PortDescriptor` arrays.
//! The compiler uses these to validate edge connections and seed bindings.

/// Name of the single input port on one-input kinds.
pub const INPUT_PORT: &str = "input";
/// Name of the output port every kind exposes.
pub const OUTPUT_PORT: &str = "output";
/// Left-hand input of a join.
pub const LEFT_PORT: &str = "left";
/// Right-hand input of a join.
pub const RIGHT_PORT: &str = "right";

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a node's port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
}

impl PortDescriptor {
    pub const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
        }
    }

    pub const fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}

/// Ports of every single-input kind.
pub static SINGLE_INPUT_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input(INPUT_PORT),
    PortDescriptor::output(OUTPUT_PORT),
];

/// Ports of a join.
pub static JOIN_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input(LEFT_PORT),
    PortDescriptor::input(RIGHT_PORT),
    PortDescriptor::output(OUTPUT_PORT),
];

/// Find a port by name and direction.
pub fn find_port<'a>(
    ports: &'a [PortDescriptor],
    name: &str,
    direction: PortDirection,
) -> Option<&'a PortDescriptor> {
    ports
        .iter()
        .find(|p| p.name == name && p.direction == direction)
}
