use std::fmt;

use pfvf_transport::Direction;
use serde::Serialize;

/// Which side of the mailbox a context plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Function {
    Pf,
    Vf,
}

impl Function {
    /// Direction this function sends in.
    pub fn send_direction(self) -> Direction {
        match self {
            Function::Pf => Direction::PfToVf,
            Function::Vf => Direction::VfToPf,
        }
    }

    /// Direction this function receives in.
    pub fn recv_direction(self) -> Direction {
        self.send_direction().reverse()
    }

    pub fn peer(self) -> Self {
        match self {
            Function::Pf => Function::Vf,
            Function::Vf => Function::Pf,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Pf => f.write_str("pf"),
            Function::Vf => f.write_str("vf"),
        }
    }
}
