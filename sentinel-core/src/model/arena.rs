use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::ids::{
    CommandHandle, ContactGroupHandle, ContactHandle, DependencyHandle, EscalationHandle,
    HostHandle, ServiceHandle, TimePeriodHandle,
};

use super::command::CommandDef;
use super::contact::{Contact, ContactGroup};
use super::dependency::Dependency;
use super::escalation::Escalation;
use super::host::Host;
use super::service::Service;
use super::time_period::TimePeriod;

/// Arena-allocated object graph with stable integer handles (spec.md §9:
/// "Re-architect as arena-allocated objects with stable integer handles;
/// store edges as handle sets"). Indices are never reused within a process
/// lifetime; a restart rebuilds a fresh `ObjectGraph` from a fresh config.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
    pub contacts: Vec<Contact>,
    pub contact_groups: Vec<ContactGroup>,
    pub time_periods: Vec<TimePeriod>,
    pub commands: Vec<CommandDef>,
    pub dependencies: Vec<Dependency>,
    pub escalations: Vec<Escalation>,

    host_by_name: HashMap<String, HostHandle>,
    service_by_identity: HashMap<(HostHandle, String), ServiceHandle>,
    contact_by_name: HashMap<String, ContactHandle>,
    contact_group_by_name: HashMap<String, ContactGroupHandle>,
    time_period_by_name: HashMap<String, TimePeriodHandle>,
    command_by_name: HashMap<String, CommandHandle>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, host: Host) -> HostHandle {
        let handle = HostHandle(self.hosts.len() as u32);
        self.host_by_name.insert(host.name.clone(), handle);
        self.hosts.push(host);
        handle
    }

    pub fn add_service(&mut self, service: Service) -> ServiceHandle {
        let handle = ServiceHandle(self.services.len() as u32);
        self.service_by_identity
            .insert((service.host, service.description.clone()), handle);
        self.services.push(service);
        handle
    }

    pub fn add_contact(&mut self, contact: Contact) -> ContactHandle {
        let handle = ContactHandle(self.contacts.len() as u32);
        self.contact_by_name.insert(contact.name.clone(), handle);
        self.contacts.push(contact);
        handle
    }

    pub fn add_contact_group(&mut self, group: ContactGroup) -> ContactGroupHandle {
        let handle = ContactGroupHandle(self.contact_groups.len() as u32);
        self.contact_group_by_name.insert(group.name.clone(), handle);
        self.contact_groups.push(group);
        handle
    }

    pub fn add_time_period(&mut self, tp: TimePeriod) -> TimePeriodHandle {
        let handle = TimePeriodHandle(self.time_periods.len() as u32);
        self.time_period_by_name.insert(tp.name.clone(), handle);
        self.time_periods.push(tp);
        handle
    }

    pub fn add_command(&mut self, cmd: CommandDef) -> CommandHandle {
        let handle = CommandHandle(self.commands.len() as u32);
        self.command_by_name.insert(cmd.name.clone(), handle);
        self.commands.push(cmd);
        handle
    }

    pub fn add_dependency(&mut self, dep: Dependency) -> DependencyHandle {
        let handle = DependencyHandle(self.dependencies.len() as u32);
        self.dependencies.push(dep);
        handle
    }

    pub fn add_escalation(&mut self, esc: Escalation) -> EscalationHandle {
        let handle = EscalationHandle(self.escalations.len() as u32);
        self.escalations.push(esc);
        handle
    }

    pub fn host(&self, h: HostHandle) -> &Host {
        &self.hosts[h.0 as usize]
    }

    pub fn host_mut(&mut self, h: HostHandle) -> &mut Host {
        &mut self.hosts[h.0 as usize]
    }

    pub fn service(&self, h: ServiceHandle) -> &Service {
        &self.services[h.0 as usize]
    }

    pub fn service_mut(&mut self, h: ServiceHandle) -> &mut Service {
        &mut self.services[h.0 as usize]
    }

    pub fn contact(&self, h: ContactHandle) -> &Contact {
        &self.contacts[h.0 as usize]
    }

    pub fn contact_group(&self, h: ContactGroupHandle) -> &ContactGroup {
        &self.contact_groups[h.0 as usize]
    }

    pub fn time_period(&self, h: TimePeriodHandle) -> &TimePeriod {
        &self.time_periods[h.0 as usize]
    }

    pub fn time_period_mut(&mut self, h: TimePeriodHandle) -> &mut TimePeriod {
        &mut self.time_periods[h.0 as usize]
    }

    pub fn command(&self, h: CommandHandle) -> &CommandDef {
        &self.commands[h.0 as usize]
    }

    pub fn find_host(&self, name: &str) -> Option<HostHandle> {
        self.host_by_name.get(name).copied()
    }

    pub fn find_service(&self, host: HostHandle, description: &str) -> Option<ServiceHandle> {
        self.service_by_identity
            .get(&(host, description.to_string()))
            .copied()
    }

    pub fn find_contact(&self, name: &str) -> Option<ContactHandle> {
        self.contact_by_name.get(name).copied()
    }

    pub fn find_contact_group(&self, name: &str) -> Option<ContactGroupHandle> {
        self.contact_group_by_name.get(name).copied()
    }

    pub fn find_time_period(&self, name: &str) -> Option<TimePeriodHandle> {
        self.time_period_by_name.get(name).copied()
    }

    pub fn find_command(&self, name: &str) -> Option<CommandHandle> {
        self.command_by_name.get(name).copied()
    }

    pub fn services_of(&self, host: HostHandle) -> impl Iterator<Item = ServiceHandle> + '_ {
        self.services.iter().enumerate().filter_map(move |(i, s)| {
            if s.host == host {
                Some(ServiceHandle(i as u32))
            } else {
                None
            }
        })
    }

    /// Rejects cyclic host-parent DAGs (spec.md §3.2, §9). Iterative DFS with
    /// an explicit stack, not recursion, so pathological chains can't blow
    /// the call stack.
    pub fn validate_host_dag(&mut self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.hosts.len()];

        for start in 0..self.hosts.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            let mut stack: Vec<(usize, Vec<HostHandle>)> = vec![(
                start,
                self.hosts[start].parent_hosts.iter().copied().collect(),
            )];
            marks[start] = Mark::InProgress;

            while let Some((node, parents)) = stack.last_mut() {
                if let Some(parent) = parents.pop() {
                    let p = parent.0 as usize;
                    match marks[p] {
                        Mark::InProgress => {
                            return Err(EngineError::CyclicReference(format!(
                                "host parent cycle involving '{}'",
                                self.hosts[p].name
                            )));
                        }
                        Mark::Done => continue,
                        Mark::Unvisited => {
                            marks[p] = Mark::InProgress;
                            stack.push((p, self.hosts[p].parent_hosts.iter().copied().collect()));
                        }
                    }
                } else {
                    marks[*node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        // Maintain child_hosts as the inverse of parent_hosts (spec.md §3.2).
        let mut children: Vec<Vec<HostHandle>> = vec![Vec::new(); self.hosts.len()];
        for (i, host) in self.hosts.iter().enumerate() {
            for &parent in &host.parent_hosts {
                children[parent.0 as usize].push(HostHandle(i as u32));
            }
        }
        for (i, host) in self.hosts.iter_mut().enumerate() {
            host.child_hosts = children[i].iter().copied().collect();
            host.circular_path_checked = true;
            host.contains_circular_path = false;
        }
        Ok(())
    }

    /// Rejects cyclic time-period exclusions (spec.md §4.1 step 3, §9).
    pub fn validate_time_period_exclusions(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.time_periods.len()];

        for start in 0..self.time_periods.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            let mut stack: Vec<(usize, Vec<TimePeriodHandle>)> = vec![(
                start,
                self.time_periods[start].exclusions.clone(),
            )];
            marks[start] = Mark::InProgress;

            while let Some((node, excls)) = stack.last_mut() {
                if let Some(excl) = excls.pop() {
                    let e = excl.0 as usize;
                    match marks[e] {
                        Mark::InProgress => {
                            return Err(EngineError::CyclicReference(format!(
                                "time-period exclusion cycle involving '{}'",
                                self.time_periods[e].name
                            )));
                        }
                        Mark::Done => continue,
                        Mark::Unvisited => {
                            marks[e] = Mark::InProgress;
                            stack.push((e, self.time_periods[e].exclusions.clone()));
                        }
                    }
                } else {
                    marks[*node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}
