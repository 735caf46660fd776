use std::thread;
use std::time::Duration;

use crate::agent_engine::device::{DeviceAgent, Services};
use crate::agent_engine::state::AgentStatus;
use crate::errors::{PilotError, PilotResult};

/// Ordered collection of device agents. An agent's position in the list is
/// its index and therefore its tile on screen.
pub struct AgentFleet {
    services: Services,
    agents: Vec<DeviceAgent>,
}

impl AgentFleet {
    pub fn new(services: Services) -> Self {
        Self { services, agents: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn titles(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.title().to_string()).collect()
    }

    pub fn any_running(&self) -> bool {
        self.agents.iter().any(DeviceAgent::is_running)
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.title() == title)
    }

    fn agent_mut(&mut self, title: &str) -> PilotResult<&mut DeviceAgent> {
        self.agents
            .iter_mut()
            .find(|a| a.title() == title)
            .ok_or_else(|| PilotError::WindowNotFound(title.to_string()))
    }

    /// Bind a new agent to `title` at the end of the list. The window is not
    /// moved until the next `resize_all` or removal.
    pub fn add(&mut self, title: &str) -> PilotResult<()> {
        if self.position(title).is_some() {
            return Err(PilotError::DuplicateDevice(title.to_string()));
        }
        let agent = DeviceAgent::new(title, self.agents.len(), self.services.clone())?;
        tracing::info!(title, index = agent.index(), handle = %agent.handle(), "device added");
        self.agents.push(agent);
        Ok(())
    }

    /// Stop and drop the agent for `title`, then close the gap in the tile
    /// order. Returns whether an agent was removed.
    pub fn remove(&mut self, title: &str) -> bool {
        let Some(pos) = self.position(title) else {
            tracing::debug!(title, "remove ignored: no such device");
            return false;
        };
        self.agents.remove(pos).stop();

        for (i, agent) in self.agents.iter().enumerate() {
            agent.set_index(i);
        }
        self.resize_all();
        tracing::info!(title, remaining = self.agents.len(), "device removed");
        true
    }

    pub fn start(&mut self, title: &str) -> PilotResult<()> {
        self.agent_mut(title)?.start();
        Ok(())
    }

    pub fn stop(&mut self, title: &str) -> PilotResult<()> {
        self.agent_mut(title)?.stop();
        Ok(())
    }

    pub fn pause(&mut self, title: &str) -> PilotResult<()> {
        self.agent_mut(title)?.pause();
        Ok(())
    }

    pub fn resume(&mut self, title: &str) -> PilotResult<()> {
        self.agent_mut(title)?.resume();
        Ok(())
    }

    pub fn start_all(&mut self) {
        for agent in &mut self.agents {
            agent.start();
        }
        tracing::info!(count = self.agents.len(), "all devices started");
    }

    /// Signal every agent first so the joins overlap instead of queueing.
    pub fn stop_all(&mut self) {
        for agent in &self.agents {
            agent.signal_stop();
        }
        for agent in &mut self.agents {
            agent.stop();
        }
        tracing::info!(count = self.agents.len(), "all devices stopped");
    }

    pub fn pause_all(&self) {
        for agent in &self.agents {
            agent.pause();
        }
    }

    pub fn resume_all(&self) {
        for agent in &self.agents {
            agent.resume();
        }
    }

    /// Tile every window by its index. Failures are logged per window.
    pub fn resize_all(&self) {
        for agent in &self.agents {
            if let Err(e) = agent.apply_layout() {
                tracing::warn!(title = agent.title(), error = %e, "failed to tile window");
            }
        }
    }

    /// Pause everything, send each window the reset gesture, then resume.
    pub fn refresh_all(&self) {
        self.pause_all();
        for agent in &self.agents {
            agent.refresh();
        }
        thread::sleep(Duration::from_millis(self.services.config.timing.refresh_resume_ms));
        self.resume_all();
        tracing::info!(count = self.agents.len(), "all devices refreshed");
    }

    /// Reset gesture for one window; its agent is paused around it.
    pub fn refresh(&self, title: &str) -> PilotResult<()> {
        let agent = self
            .agents
            .iter()
            .find(|a| a.title() == title)
            .ok_or_else(|| PilotError::WindowNotFound(title.to_string()))?;
        let was_paused = agent.is_paused();
        agent.pause();
        agent.refresh();
        thread::sleep(Duration::from_millis(self.services.config.timing.refresh_resume_ms));
        if !was_paused {
            agent.resume();
        }
        Ok(())
    }

    pub fn statuses(&self) -> Vec<AgentStatus> {
        self.agents.iter().map(DeviceAgent::status).collect()
    }

    /// Titles of top-level windows that could be added.
    pub fn available_windows(&self) -> Vec<String> {
        self.services.windows.list_titles()
    }
}

impl Drop for AgentFleet {
    fn drop(&mut self) {
        self.stop_all();
    }
}
