// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod coordinator;
mod errors;
mod events;
mod policy;
mod roster;
mod state;
mod transport;

pub use coordinator::*;
pub use errors::*;
pub use events::*;
pub use policy::*;
pub use roster::*;
pub use state::*;
pub use transport::*;
