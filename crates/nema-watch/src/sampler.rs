// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io;
use std::time::Duration;

use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Source of the process's accumulated CPU time.
///
/// The watchdog thread is generic over this so tests can drive the trip
/// policy with scripted readings instead of burning real CPU.
pub trait CpuTimeSource: Send {
    /// Total CPU time this process has consumed so far, monotonically
    /// non-decreasing.
    fn cpu_time(&mut self) -> Duration;
}

/// Reads the current process's CPU time from the OS.
pub struct ProcessCpuSource {
    system: System,
    pid: Pid,
}

impl ProcessCpuSource {
    /// Creates a source bound to the current process.
    pub fn new() -> io::Result<Self> {
        let pid = get_current_pid().map_err(io::Error::other)?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }
}

impl CpuTimeSource for ProcessCpuSource {
    fn cpu_time(&mut self) -> Duration {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        match self.system.process(self.pid) {
            Some(process) => Duration::from_millis(process.accumulated_cpu_time()),
            None => {
                // Refreshing our own pid cannot reasonably miss; treat it
                // as a zero reading rather than a crash.
                log::warn!("Could not read CPU time for pid {}", self.pid);
                Duration::ZERO
            }
        }
    }
}
