//! The event arena and its firing semantics.
//!
//! ```text
//! sensor change ──► on_sensor_data_changed ──(condition true)──► unbind ──► fire
//!                                                                            │
//!   fire:  start actions ─► stop actions ─► sub-events ─► start/stop listening
//!                                                                            │
//!                                             next (after delay, via Scheduler)
//! ```
//!
//! Everything up to the listener toggles runs synchronously on the caller's
//! thread, in insertion order. Only the successor is deferred.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::action::{Action, FireArgs};
use crate::condition::Condition;
use crate::config::GraphConfig;
use crate::error::{CascadeError, Result};
use crate::event::{EventId, EventInfo, EventKey, EventNode, EventRecord, SensorBinding};
use crate::scheduler::{ScheduledTask, Scheduler, TimerId};
use crate::sensor::{DataChangeCallback, Readings, Sensor};

/// Collects events and their edges, then freezes them into an [`EventGraph`].
pub struct EventGraphBuilder {
    nodes: Vec<EventNode>,
    index: HashMap<EventId, EventKey>,
    scheduler: Arc<dyn Scheduler>,
    config: GraphConfig,
}

impl EventGraphBuilder {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            scheduler,
            config: GraphConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a plain event.
    pub fn add_event(&mut self, record: EventRecord) -> Result<EventKey> {
        self.insert(record, None)
    }

    /// Add a sensor-bound event with the constant-false default condition.
    pub fn add_sensor_event(
        &mut self,
        record: EventRecord,
        sensor: Arc<dyn Sensor>,
    ) -> Result<EventKey> {
        self.insert(record, Some(SensorBinding::new(sensor, Condition::never())))
    }

    pub fn add_sensor_event_with_condition(
        &mut self,
        record: EventRecord,
        sensor: Arc<dyn Sensor>,
        condition: impl Into<String>,
    ) -> Result<EventKey> {
        let condition = Condition::new(condition);
        self.insert(record, Some(SensorBinding::new(sensor, condition)))
    }

    fn insert(&mut self, record: EventRecord, binding: Option<SensorBinding>) -> Result<EventKey> {
        if self.index.contains_key(&record.id) {
            return Err(CascadeError::DuplicateEventId(record.id));
        }
        let delay = record.delay_duration()?;
        let key = EventKey(self.nodes.len());
        self.nodes.push(EventNode::new(&record, delay, binding));
        self.index.insert(record.id, key);
        Ok(key)
    }

    pub fn add_action(&mut self, key: EventKey, action: Arc<dyn Action>) -> Result<()> {
        self.node_mut(key)?.start_actions.push(action);
        Ok(())
    }

    pub fn add_stop_action(&mut self, key: EventKey, action: Arc<dyn Action>) -> Result<()> {
        self.node_mut(key)?.stop_actions.push(action);
        Ok(())
    }

    /// Fire `child` synchronously, with the same arguments, whenever `key` fires.
    pub fn add_sub_event(&mut self, key: EventKey, child: EventKey) -> Result<()> {
        self.check(child)?;
        self.node_mut(key)?.sub_events.push(child);
        Ok(())
    }

    /// Schedule `successor` after `key`'s delay whenever `key` fires.
    pub fn set_next(&mut self, key: EventKey, successor: EventKey) -> Result<()> {
        self.check(successor)?;
        self.node_mut(key)?.next = Some(successor);
        Ok(())
    }

    pub fn add_start_listening(&mut self, key: EventKey, target: EventKey) -> Result<()> {
        self.check_sensor_bound(target)?;
        self.node_mut(key)?.start_listening.push(target);
        Ok(())
    }

    pub fn add_stop_listening(&mut self, key: EventKey, target: EventKey) -> Result<()> {
        self.check_sensor_bound(target)?;
        self.node_mut(key)?.stop_listening.push(target);
        Ok(())
    }

    pub fn set_condition(&mut self, key: EventKey, expr: impl Into<String>) -> Result<()> {
        let node = self.node_mut(key)?;
        let binding = node
            .binding
            .as_ref()
            .ok_or_else(|| CascadeError::NotSensorBound(node.id.clone()))?;
        binding.lock().condition = Condition::new(expr);
        Ok(())
    }

    pub fn key_of(&self, id: &EventId) -> Option<EventKey> {
        self.index.get(id).copied()
    }

    pub fn build(self) -> EventGraph {
        tracing::debug!(events = self.nodes.len(), "event graph built");
        EventGraph {
            inner: Arc::new(GraphInner {
                nodes: self.nodes,
                index: self.index,
                scheduler: self.scheduler,
                config: self.config,
                timers: Mutex::new(Vec::new()),
            }),
        }
    }

    fn check(&self, key: EventKey) -> Result<()> {
        if key.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(CascadeError::UnknownEvent(key.0))
        }
    }

    fn check_sensor_bound(&self, key: EventKey) -> Result<()> {
        self.check(key)?;
        let node = &self.nodes[key.0];
        match node.binding {
            Some(_) => Ok(()),
            None => Err(CascadeError::NotSensorBound(node.id.clone())),
        }
    }

    fn node_mut(&mut self, key: EventKey) -> Result<&mut EventNode> {
        self.nodes
            .get_mut(key.0)
            .ok_or(CascadeError::UnknownEvent(key.0))
    }
}

/// A built event graph.
///
/// Cloning is cheap and every clone drives the same events. When the last
/// handle is dropped, pending successors are cancelled and every sensor-bound
/// event is unsubscribed.
#[derive(Clone)]
pub struct EventGraph {
    inner: Arc<GraphInner>,
}

impl EventGraph {
    /// Fire an event: run its cascade and schedule its successor.
    ///
    /// Any action or sub-event failure aborts the remaining steps and is
    /// returned as is.
    pub fn fire(&self, key: EventKey, args: &FireArgs) -> Result<()> {
        self.inner.fire(key, args, false, 0)
    }

    /// Like [`fire`](Self::fire), also emitting an `info` diagnostic naming
    /// the event.
    pub fn fire_verbose(&self, key: EventKey, args: &FireArgs) -> Result<()> {
        self.inner.fire(key, args, true, 0)
    }

    /// Alias of [`fire`](Self::fire).
    #[inline]
    pub fn emit(&self, key: EventKey, args: &FireArgs) -> Result<()> {
        self.fire(key, args)
    }

    /// Subscribe a sensor-bound event to its sensor. Already listening is a no-op.
    pub fn start_listening(&self, key: EventKey) -> Result<()> {
        self.inner.start_listening(key)
    }

    /// Unsubscribe a sensor-bound event. Not listening is a no-op.
    pub fn stop_listening(&self, key: EventKey) -> Result<()> {
        self.inner.stop_listening(key)
    }

    pub fn is_listening(&self, key: EventKey) -> Result<bool> {
        Ok(self.inner.binding(key)?.lock().subscription.is_some())
    }

    /// Replace a sensor-bound event's condition. Validation happens on the
    /// next evaluation.
    pub fn set_condition(&self, key: EventKey, expr: impl Into<String>) -> Result<()> {
        self.inner.binding(key)?.lock().condition = Condition::new(expr);
        Ok(())
    }

    pub fn condition(&self, key: EventKey) -> Result<String> {
        Ok(self.inner.binding(key)?.lock().condition.source().to_string())
    }

    pub fn key_of(&self, id: &EventId) -> Option<EventKey> {
        self.inner.index.get(id).copied()
    }

    pub fn event(&self, key: EventKey) -> Result<EventInfo> {
        let node = self.inner.node(key)?;
        Ok(EventInfo {
            key,
            id: node.id.clone(),
            name: node.name.clone(),
            delay: node.delay,
            next: node.next,
            sensor_bound: node.binding.is_some(),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = EventKey> {
        (0..self.inner.nodes.len()).map(EventKey)
    }

    pub fn len(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }

    /// Cancel delayed successors that have not run yet. Returns how many were
    /// cancelled.
    pub fn cancel_pending(&self) -> usize {
        self.inner.cancel_pending()
    }

    /// Cancel pending successors and unsubscribe every sensor-bound event.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl fmt::Debug for EventGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGraph")
            .field("events", &self.inner.nodes.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

struct GraphInner {
    nodes: Vec<EventNode>,
    index: HashMap<EventId, EventKey>,
    scheduler: Arc<dyn Scheduler>,
    config: GraphConfig,
    timers: Mutex<Vec<TimerId>>,
}

impl GraphInner {
    fn node(&self, key: EventKey) -> Result<&EventNode> {
        self.nodes.get(key.0).ok_or(CascadeError::UnknownEvent(key.0))
    }

    fn binding(&self, key: EventKey) -> Result<&SensorBinding> {
        let node = self.node(key)?;
        node.binding
            .as_ref()
            .ok_or_else(|| CascadeError::NotSensorBound(node.id.clone()))
    }

    fn fire(
        self: &Arc<Self>,
        key: EventKey,
        args: &FireArgs,
        verbose: bool,
        depth: usize,
    ) -> Result<()> {
        let node = self.node(key)?;
        if depth > self.config.max_cascade_depth {
            return Err(CascadeError::CascadeDepthExceeded {
                event: node.id.clone(),
                limit: self.config.max_cascade_depth,
            });
        }

        if verbose {
            tracing::info!(event.name = %node.name, event.id = %node.id, "event fired");
        } else {
            tracing::debug!(event.name = %node.name, event.id = %node.id, depth, "event fired");
        }

        for action in &node.start_actions {
            action.fire(args).map_err(|source| action_error(node, action, source))?;
        }
        for action in &node.stop_actions {
            action.stop(args).map_err(|source| action_error(node, action, source))?;
        }
        for &child in &node.sub_events {
            self.fire(child, args, false, depth + 1)?;
        }
        for &target in &node.start_listening {
            self.start_listening(target)?;
        }
        for &target in &node.stop_listening {
            self.stop_listening(target)?;
        }
        if let Some(next) = node.next {
            self.schedule_next(node, next)?;
        }
        Ok(())
    }

    fn schedule_next(self: &Arc<Self>, node: &EventNode, next: EventKey) -> Result<()> {
        let graph = Arc::downgrade(self);
        let task: ScheduledTask = Box::new(move || run_successor(&graph, next));

        let timer = self
            .scheduler
            .schedule(node.delay, task)
            .map_err(|source| CascadeError::Scheduling {
                event: node.id.clone(),
                source,
            })?;

        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.retain(|t| self.scheduler.is_pending(*t));
        timers.push(timer);
        tracing::debug!(
            event.id = %node.id,
            successor = %next,
            delay = ?node.delay,
            "successor scheduled"
        );
        Ok(())
    }

    fn start_listening(self: &Arc<Self>, key: EventKey) -> Result<()> {
        let binding = self.binding(key)?;
        let mut state = binding.lock();
        if state.subscription.is_some() {
            return Ok(());
        }

        state.generation += 1;
        let generation = state.generation;
        let graph: Weak<GraphInner> = Arc::downgrade(self);
        let on_change: DataChangeCallback = Arc::new(move |new, old| match graph.upgrade() {
            Some(graph) => graph.on_sensor_data_changed(key, generation, new, old),
            None => Ok(()),
        });

        // Sensors must not call back synchronously from `bind`.
        state.subscription = Some(binding.sensor.bind(on_change));
        tracing::debug!(event = %key, sensor = binding.sensor.name(), "listening");
        Ok(())
    }

    fn stop_listening(&self, key: EventKey) -> Result<()> {
        let binding = self.binding(key)?;
        let mut state = binding.lock();
        if let Some(subscription) = state.subscription.take() {
            binding.sensor.unbind(subscription);
            tracing::debug!(event = %key, sensor = binding.sensor.name(), "stopped listening");
        }
        Ok(())
    }

    /// Evaluate, then unsubscribe and fire on a match.
    ///
    /// Evaluation and unsubscribe happen under the instance lock, so of two
    /// racing notifications at most one can see a match.
    fn on_sensor_data_changed(
        self: &Arc<Self>,
        key: EventKey,
        generation: u64,
        new: &Readings,
        old: &Readings,
    ) -> Result<()> {
        let node = self.node(key)?;
        let binding = self.binding(key)?;
        {
            let mut state = binding.lock();
            if state.subscription.is_none() || state.generation != generation {
                return Ok(());
            }
            tracing::trace!(event = %node.id, ?new, ?old, "sensor data changed");

            let variables = binding.sensor.readings().variables();
            let matched = state
                .condition
                .evaluate(&variables)
                .map_err(|source| CascadeError::Evaluation {
                    event: node.id.clone(),
                    source,
                })?;
            if !matched {
                return Ok(());
            }
            if let Some(subscription) = state.subscription.take() {
                binding.sensor.unbind(subscription);
            }
        }

        tracing::debug!(event = %node.id, "condition matched");
        self.fire(key, &FireArgs::none(), false, 0)
    }

    fn cancel_pending(&self) -> usize {
        let timers = {
            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *timers)
        };
        timers
            .into_iter()
            .filter(|timer| self.scheduler.cancel(*timer))
            .count()
    }

    fn shutdown(&self) {
        let cancelled = self.cancel_pending();
        for binding in self.nodes.iter().filter_map(|node| node.binding.as_ref()) {
            if let Some(subscription) = binding.lock().subscription.take() {
                binding.sensor.unbind(subscription);
            }
        }
        tracing::debug!(cancelled, "event graph shut down");
    }
}

impl Drop for GraphInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_successor(graph: &Weak<GraphInner>, next: EventKey) {
    let Some(graph) = graph.upgrade() else {
        return;
    };
    if let Err(err) = graph.fire(next, &FireArgs::none(), false, 0) {
        tracing::warn!(error = %err, successor = %next, "delayed successor failed");
    }
}

fn action_error(node: &EventNode, action: &Arc<dyn Action>, source: anyhow::Error) -> CascadeError {
    CascadeError::Action {
        event: node.id.clone(),
        action: action.name().to_string(),
        source,
    }
}
