//! Engine: run context owning the virtual clock, the toolkit, the layout stack
//! and every participant, plus the dispatch of scheduled transitions.
//!
//! Methods:
//! - add_element, enter_layout / exit_layout / with_layout, cancel
//! - animate, slide, live_change, property_ref
//! - advance_to, step, run_until_idle (dispatch)

use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::animation::{AnimPhase, Animate, AnimationState, Slide};
use crate::clock::{Due, Scheduler};
use crate::config::Config;
use crate::element::{CancelPlan, ElementState, Phase};
use crate::error::{CueError, Failure};
use crate::ids::{AnimId, ElementId, GroupId, IdAllocator, StateRef, TaskHandle, WidgetHandle};
use crate::layout::{GroupingRegion, LayoutStack};
use crate::outputs::{ElementRecord, Outputs, StateEvent};
use crate::params::{ElementDecl, LayoutChoice, Param, PlacementKey};
use crate::refs::{PropertyRef, RefCache};
use crate::resolver::resolve;
use crate::toolkit::Toolkit;
use crate::value::{PropertyMap, Value};

/// Scheduled transition. Dispatch looks the participant up by id, so tasks
/// stay valid (and harmless) after the participant finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    Appear(ElementId),
    Disappear(ElementId),
    Leave(StateRef),
    Finalize(StateRef),
    Tick(AnimId),
}

pub struct Engine<K: Toolkit> {
    cfg: Config,
    ids: IdAllocator,
    clock: Scheduler<Task>,
    toolkit: K,
    layouts: LayoutStack,

    // Arenas indexed by dense ids
    elements: Vec<ElementState>,
    animations: Vec<AnimationState>,
    groups: Vec<GroupingRegion>,

    widgets: HashMap<WidgetHandle, ElementId>,
    failures: Vec<Failure>,
    outputs: Outputs,
}

impl<K: Toolkit> std::fmt::Debug for Engine<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("now", &self.clock.now())
            .field("pending", &self.clock.pending())
            .field("elements", &self.elements.len())
            .field("animations", &self.animations.len())
            .field("groups", &self.groups.len())
            .field("layout_depth", &self.layouts.len())
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl<K: Toolkit> Engine<K> {
    pub fn new(cfg: Config, toolkit: K) -> Result<Self, CueError> {
        cfg.validate()?;
        Ok(Self::build(cfg, toolkit))
    }

    /// Engine with the default configuration.
    pub fn with_toolkit(toolkit: K) -> Self {
        Self::build(Config::default(), toolkit)
    }

    fn build(cfg: Config, toolkit: K) -> Self {
        Self {
            cfg,
            ids: IdAllocator::default(),
            clock: Scheduler::new(),
            toolkit,
            layouts: LayoutStack::new(),
            elements: Vec::new(),
            animations: Vec::new(),
            groups: Vec::new(),
            widgets: HashMap::new(),
            failures: Vec::new(),
            outputs: Outputs::default(),
        }
    }

    // ---------- accessors ----------

    #[inline]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn toolkit(&self) -> &K {
        &self.toolkit
    }

    pub fn toolkit_mut(&mut self) -> &mut K {
        &mut self.toolkit
    }

    /// Tick period for animations: the toolkit's refresh interval when it
    /// reports a usable one, else the configured fallback.
    pub fn frame_interval(&self) -> f64 {
        self.toolkit
            .frame_interval()
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(self.cfg.frame_interval)
    }

    pub fn element(&self, id: ElementId) -> Option<&ElementState> {
        self.elements.get(id.0 as usize)
    }

    pub fn animation(&self, id: AnimId) -> Option<&AnimationState> {
        self.animations.get(id.0 as usize)
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupingRegion> {
        self.groups.get(id.0 as usize)
    }

    /// Grouping region opened on `element`, most recent first.
    pub fn group_of(&self, element: ElementId) -> Option<&GroupingRegion> {
        self.groups.iter().rev().find(|g| g.owner == element)
    }

    pub fn layout_stack(&self) -> &LayoutStack {
        &self.layouts
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn records(&self) -> &[ElementRecord] {
        &self.outputs.records
    }

    pub fn events(&self) -> &[StateEvent] {
        &self.outputs.events
    }

    pub fn drain_events(&mut self) -> Vec<StateEvent> {
        self.outputs.drain_events()
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// No transition is scheduled.
    pub fn is_idle(&self) -> bool {
        self.clock.pending() == 0
    }

    pub fn next_event_time(&mut self) -> Option<f64> {
        self.clock.peek_time()
    }

    /// Whether `target` finalized or failed. Unknown ids count as finished.
    pub fn is_finished(&self, target: StateRef) -> bool {
        match target {
            StateRef::Element(id) => self.element(id).map_or(true, |e| e.phase.is_terminal()),
            StateRef::Animation(id) => self.animation(id).map_or(true, |a| a.phase.is_terminal()),
        }
    }

    fn elem(&self, id: ElementId) -> Result<&ElementState, CueError> {
        self.elements
            .get(id.0 as usize)
            .ok_or(CueError::UnknownElement { id })
    }

    fn elem_mut(&mut self, id: ElementId) -> Result<&mut ElementState, CueError> {
        self.elements
            .get_mut(id.0 as usize)
            .ok_or(CueError::UnknownElement { id })
    }

    fn anim(&self, id: AnimId) -> Result<&AnimationState, CueError> {
        self.animations
            .get(id.0 as usize)
            .ok_or(CueError::UnknownAnimation { id })
    }

    fn anim_mut(&mut self, id: AnimId) -> Result<&mut AnimationState, CueError> {
        self.animations
            .get_mut(id.0 as usize)
            .ok_or(CueError::UnknownAnimation { id })
    }

    // ---------- elements ----------

    /// Enter a new element: resolve its parameters and placement, construct
    /// its widget and schedule appear at `start_time` (disappear at the end,
    /// when it has one). Nothing is registered when any step fails.
    pub fn add_element(&mut self, decl: ElementDecl) -> Result<ElementId, CueError> {
        decl.validate_timing()?;

        let layout = match decl.layout {
            LayoutChoice::Inherit => self.layouts.top(),
            LayoutChoice::Root => None,
            LayoutChoice::Within(id) => {
                let owner = self.elem(id)?;
                if !self.toolkit.is_container(&owner.class) {
                    return Err(CueError::NotLayoutCapable {
                        element: id,
                        class: owner.class.clone(),
                    });
                }
                Some(id)
            }
        };

        let values = self.resolve_params(&decl.class, &decl.params)?;
        let placement = resolve(&values, &decl.hints);
        let widget = self
            .toolkit
            .construct(&decl.class, &placement)
            .map_err(CueError::toolkit)?;
        let names = self.toolkit.property_names(&decl.class);
        if let Err(err) = self.toolkit.subscribe(widget, &names) {
            self.toolkit.release(widget);
            return Err(CueError::toolkit(err));
        }

        let id = self.ids.alloc_element();
        debug_assert_eq!(id.0 as usize, self.elements.len());
        let now = self.now();
        let end_time = decl.end_time();
        let appear_at = decl.start_time.max(now);

        let appear = self.clock.schedule(Task::Appear(id), appear_at, None);
        let disappear = end_time.map(|end| {
            self.clock
                .schedule(Task::Disappear(id), end.max(appear_at), None)
        });

        let state = ElementState {
            id,
            name: decl.name,
            class: decl.class,
            params: decl.params,
            hints: decl.hints,
            init_values: values.clone(),
            values,
            placement: Some(placement),
            start_time: decl.start_time,
            end_time,
            duration: decl.duration,
            appear_time: None,
            disappear_time: None,
            on_screen: false,
            phase: Phase::Pending,
            layout,
            index: decl.index,
            widget,
            parent_widget: None,
            pending_appear: Some(appear),
            pending_disappear: disappear,
            pending_finalize: None,
            left: false,
            retracted: false,
            refs: RefCache::new(id, self.cfg.ref_cache_capacity),
            region: None,
        };
        debug!(
            "enter {}: start {} end {:?} parent {}",
            state.label(),
            state.start_time,
            state.end_time,
            layout.map_or_else(|| self.cfg.root_name.clone(), |l| l.to_string())
        );
        self.elements.push(state);
        self.widgets.insert(widget, id);
        self.join_region(StateRef::Element(id));
        self.outputs.push_event(StateEvent::Entered {
            target: StateRef::Element(id),
            time: now,
        });
        Ok(id)
    }

    /// Resolve every declared parameter now and check it against the class.
    fn resolve_params(
        &self,
        class: &str,
        params: &IndexMap<String, Param>,
    ) -> Result<PropertyMap, CueError> {
        let known = self.toolkit.property_names(class);
        let mut values = PropertyMap::with_capacity(params.len());
        for (name, param) in params {
            let value = param.resolve(self)?;
            match PlacementKey::from_name(name) {
                Some(key) => key.validate(&value)?,
                None if known.iter().any(|k| k == name) => {}
                None => {
                    return Err(CueError::UnknownProperty {
                        class: class.to_string(),
                        name: name.clone(),
                    })
                }
            }
            values.insert(name.clone(), value);
        }
        Ok(values)
    }

    fn join_region(&mut self, target: StateRef) {
        if let Some(gid) = self.layouts.top_region() {
            if let Some(group) = self.groups.get_mut(gid.0 as usize) {
                group.claim_child(target);
                trace!("{target} joined {gid}");
            }
        }
    }

    // ---------- layouts ----------

    /// Open a grouping region on a container element and make it the parent
    /// of elements declared until the matching [`Engine::exit_layout`].
    pub fn enter_layout(&mut self, id: ElementId) -> Result<GroupId, CueError> {
        let el = self.elem(id)?;
        if el.region.is_some() {
            return Err(CueError::LayoutReentered { element: id });
        }
        if !self.toolkit.is_container(&el.class) {
            return Err(CueError::NotLayoutCapable {
                element: id,
                class: el.class.clone(),
            });
        }
        let gid = self.ids.alloc_group();
        debug_assert_eq!(gid.0 as usize, self.groups.len());
        self.groups.push(GroupingRegion::new(gid, id));
        self.elem_mut(id)?.region = Some(gid);
        self.layouts.push(id, gid);
        debug!("layout {id} opened {gid} (depth {})", self.layouts.len());
        Ok(gid)
    }

    /// Close the innermost layout. With a declared duration the owner alone
    /// blocks group completion, otherwise every child except the owner does.
    pub fn exit_layout(&mut self, id: ElementId) -> Result<GroupId, CueError> {
        let gid = self
            .layouts
            .pop_if(id)
            .ok_or(CueError::LayoutNotOpen { element: id })?;
        let el = self.elem_mut(id)?;
        el.region = None;
        let has_duration = el.duration.is_some();
        let group = self
            .groups
            .get_mut(gid.0 as usize)
            .ok_or(CueError::UnknownGroup { id: gid })?;
        group.close(has_duration);
        debug!(
            "layout {id} closed {gid} with {} children",
            group.children.len()
        );
        self.check_groups();
        Ok(gid)
    }

    /// Run `body` with the layout of an existing element open. The layout is
    /// closed again even when `body` fails.
    pub fn scoped_layout<F>(&mut self, id: ElementId, body: F) -> Result<GroupId, CueError>
    where
        F: FnOnce(&mut Self) -> Result<(), CueError>,
    {
        self.enter_layout(id)?;
        let result = body(self);
        let gid = self.exit_layout(id)?;
        result.map(|()| gid)
    }

    /// Declare a container element and populate it inside its layout scope.
    pub fn with_layout<F>(&mut self, decl: ElementDecl, body: F) -> Result<ElementId, CueError>
    where
        F: FnOnce(&mut Self) -> Result<(), CueError>,
    {
        let id = self.add_element(decl)?;
        self.scoped_layout(id, body)?;
        Ok(id)
    }

    // ---------- cancellation ----------

    /// Request the end of a participant at `cancel_time`. Only ever moves its
    /// end earlier; a request at or before the start retracts it entirely.
    pub fn cancel(&mut self, target: impl Into<StateRef>, cancel_time: f64) -> Result<(), CueError> {
        let target = target.into();
        if !cancel_time.is_finite() {
            let start = match target {
                StateRef::Element(id) => self.elem(id)?.start_time,
                StateRef::Animation(id) => self.anim(id)?.start_time,
            };
            return Err(CueError::InvalidTiming {
                start,
                end: Some(cancel_time),
            });
        }
        let end_time = match target {
            StateRef::Element(id) => self.cancel_element(id, cancel_time)?,
            StateRef::Animation(id) => self.cancel_animation(id, cancel_time)?,
        };
        self.outputs.push_event(StateEvent::Cancelled {
            target,
            requested: cancel_time,
            end_time,
        });
        Ok(())
    }

    fn cancel_element(&mut self, id: ElementId, cancel_time: f64) -> Result<Option<f64>, CueError> {
        let now = self.now();
        let plan = self.elem(id)?.plan_cancel(cancel_time, now);
        let el = self.elem_mut(id)?;
        match plan {
            CancelPlan::Ignore => {
                trace!("cancel of {} at {cancel_time} ignored", el.label());
            }
            CancelPlan::Retract { on_screen } => {
                debug!("retract {} (on screen: {on_screen})", el.label());
                let stale = [el.pending_appear.take(), el.pending_disappear.take()];
                el.end_time = Some(el.start_time);
                el.retracted = true;
                if !on_screen {
                    el.phase = Phase::CancelledBeforeStart;
                }
                for handle in stale.into_iter().flatten() {
                    self.clock.unschedule(handle);
                }
                if on_screen {
                    let h = self.clock.schedule(Task::Disappear(id), now, None);
                    self.elem_mut(id)?.pending_disappear = Some(h);
                } else {
                    let h = self
                        .clock
                        .schedule(Task::Finalize(StateRef::Element(id)), now, None);
                    self.elem_mut(id)?.pending_finalize = Some(h);
                }
                self.schedule_leave(StateRef::Element(id), now);
            }
            CancelPlan::Shorten { at, clamped } => {
                if clamped {
                    warn!(
                        "cancel of {} requested for {cancel_time}, already past; ending at {at}",
                        el.label()
                    );
                }
                let stale = el.pending_disappear.take();
                el.end_time = Some(at);
                if el.on_screen {
                    el.phase = Phase::CancelledEarly;
                }
                if let Some(handle) = stale {
                    self.clock.unschedule(handle);
                }
                let h = self.clock.schedule(Task::Disappear(id), at, None);
                self.elem_mut(id)?.pending_disappear = Some(h);
                debug!("element {id} now ends at {at}");
            }
        }
        Ok(self.elem(id)?.end_time)
    }

    fn cancel_animation(&mut self, id: AnimId, cancel_time: f64) -> Result<Option<f64>, CueError> {
        let now = self.now();
        let anim = self.anim(id)?;
        let Some(end) = anim.plan_cancel(cancel_time, now) else {
            trace!("cancel of {id} at {cancel_time} ignored");
            return Ok(anim.end_time);
        };
        if cancel_time < now && cancel_time > anim.start_time {
            warn!("cancel of {id} requested for {cancel_time}, already past; ending at {end}");
        }
        self.anim_mut(id)?.end_time = Some(end);
        debug!("animation {id} now ends at {end}");
        if end <= now {
            // Let the next tick observe the new end right away.
            if let Some(handle) = self.anim_mut(id)?.tick.take() {
                self.clock.unschedule(handle);
            }
            let frame = self.frame_interval();
            let h = self.clock.schedule(Task::Tick(id), now, Some(frame));
            self.anim_mut(id)?.tick = Some(h);
        }
        Ok(Some(end))
    }

    // ---------- animations ----------

    /// Start an animation of `target`'s properties. Ticks begin one frame
    /// after the start time and repeat every frame until the end.
    pub fn animate(&mut self, target: ElementId, anim: Animate) -> Result<AnimId, CueError> {
        let el = self.elem(target)?;
        if el.phase.is_terminal() {
            return Err(CueError::TargetNotLive { element: target });
        }
        if !anim.start_time.is_finite()
            || anim.duration.is_some_and(|d| !d.is_finite() || d < 0.0)
        {
            return Err(CueError::InvalidTiming {
                start: anim.start_time,
                end: anim.duration.map(|d| anim.start_time + d),
            });
        }
        for name in anim.params.keys() {
            self.check_property(target, name)?;
        }

        let id = self.ids.alloc_anim();
        debug_assert_eq!(id.0 as usize, self.animations.len());
        let now = self.now();
        let frame = self.frame_interval();
        let begin = anim.start_time.max(now);
        let tick = self.clock.schedule(Task::Tick(id), begin + frame, Some(frame));

        debug!(
            "animate {target} via {id}: {:?} from {} for {:?}",
            anim.params.keys().collect::<Vec<_>>(),
            anim.start_time,
            anim.duration
        );
        self.animations.push(AnimationState {
            id,
            name: anim.name,
            target,
            anim_params: anim.params,
            initial_params: None,
            start_time: anim.start_time,
            end_time: anim.duration.map(|d| anim.start_time + d),
            phase: AnimPhase::Running,
            tick: Some(tick),
            left: false,
            ticks: 0,
        });
        self.schedule_leave(StateRef::Animation(id), begin);
        self.join_region(StateRef::Animation(id));
        self.outputs.push_event(StateEvent::Entered {
            target: StateRef::Animation(id),
            time: now,
        });
        Ok(id)
    }

    /// Linear interpolation of properties towards targets over a duration.
    pub fn slide(&mut self, target: ElementId, slide: Slide) -> Result<AnimId, CueError> {
        let anim = slide.into_animate()?;
        self.animate(target, anim)
    }

    // ---------- live properties ----------

    /// Merge new parameter values into an element, re-resolve its placement
    /// and push the result to its widget.
    pub fn live_change(
        &mut self,
        id: ElementId,
        updates: IndexMap<String, Param>,
    ) -> Result<(), CueError> {
        let el = self.elem(id)?;
        if el.phase == Phase::Failed {
            return Err(CueError::TargetNotLive { element: id });
        }
        let resolved = self.resolve_params(&el.class, &updates)?;
        let el = self.elem_mut(id)?;
        el.params.extend(updates);
        el.values.extend(resolved);
        let spec = resolve(&el.values, &el.hints);
        let widget = el.widget;

        for (name, value) in &spec.properties {
            self.toolkit
                .set_property(widget, name, value.clone())
                .map_err(CueError::toolkit)?;
        }
        self.toolkit
            .set_hints(widget, &spec.hints)
            .map_err(CueError::toolkit)?;

        let el = self.elem_mut(id)?;
        for name in spec.properties.keys() {
            el.refs.invalidate(name);
        }
        el.placement = Some(spec);
        Ok(())
    }

    /// Shared reference to a live property of `id`.
    pub fn property_ref(&mut self, id: ElementId, name: &str) -> Result<PropertyRef, CueError> {
        self.check_property(id, name)?;
        Ok(self.elem_mut(id)?.refs.get_or_issue(name))
    }

    /// `name` is a placement key or a property of the element's class.
    fn check_property(&self, id: ElementId, name: &str) -> Result<(), CueError> {
        let el = self.elem(id)?;
        if PlacementKey::from_name(name).is_some()
            || self
                .toolkit
                .property_names(&el.class)
                .iter()
                .any(|k| k == name)
        {
            return Ok(());
        }
        Err(CueError::UnknownProperty {
            class: el.class.clone(),
            name: name.to_string(),
        })
    }

    /// Read a property straight from the element's widget.
    pub fn current_property(&self, id: ElementId, name: &str) -> Result<Value, CueError> {
        let el = self.elem(id)?;
        self.toolkit
            .get_property(el.widget, name)
            .ok_or_else(|| CueError::PropertyUnavailable {
                element: id,
                name: name.to_string(),
            })
    }

    /// Pull property changes reported by the toolkit and invalidate the
    /// matching references.
    pub fn sync_changes(&mut self) -> usize {
        let changes = self.toolkit.take_changes();
        let mut applied = 0;
        for change in &changes {
            if let Some(id) = self.widgets.get(&change.widget) {
                if let Some(el) = self.elements.get(id.0 as usize) {
                    el.refs.invalidate(&change.name);
                    applied += 1;
                }
            }
        }
        applied
    }

    // ---------- time ----------

    /// Run every transition due at or before `t`, then move the clock to `t`.
    /// Returns the number of dispatched tasks.
    pub fn advance_to(&mut self, t: f64) -> usize {
        let (count, exhausted) = self.run(t);
        if exhausted {
            self.clock.advance(t);
        }
        count
    }

    pub fn step(&mut self, dt: f64) -> usize {
        let target = self.now() + dt.max(0.0);
        self.advance_to(target)
    }

    /// Dispatch until nothing is scheduled at or before `horizon`. The clock
    /// stays at the last dispatched time.
    pub fn run_until_idle(&mut self, horizon: f64) -> usize {
        self.run(horizon).0
    }

    fn run(&mut self, until: f64) -> (usize, bool) {
        let limit = self.cfg.max_dispatch_per_advance;
        let mut count = 0;
        while count < limit {
            let Some(due) = self.clock.pop_due(until) else {
                return (count, true);
            };
            count += 1;
            self.dispatch(due);
        }
        let exhausted = self.clock.peek_time().map_or(true, |next| next > until);
        if !exhausted {
            warn!(
                "dispatch limit {limit} reached before {until}; clock held at {}",
                self.now()
            );
        }
        (count, exhausted)
    }

    fn dispatch(&mut self, due: Due<Task>) {
        trace!("t={} dispatch {:?}", due.time, due.task);
        match due.task {
            Task::Appear(id) => {
                let result = self.appear(id);
                self.capture(StateRef::Element(id), "appear", result);
            }
            Task::Disappear(id) => {
                let result = self.disappear(id);
                self.capture(StateRef::Element(id), "disappear", result);
            }
            Task::Leave(target) => {
                self.outputs.push_event(StateEvent::Leave {
                    target,
                    time: due.time,
                });
            }
            Task::Finalize(target) => {
                let result = self.finalize(target);
                self.capture(target, "finalize", result);
            }
            Task::Tick(id) => {
                let result = self.tick(id, due.handle);
                self.capture(StateRef::Animation(id), "tick", result);
            }
        }
        self.sync_changes();
        self.check_groups();
    }

    fn capture(&mut self, target: StateRef, phase: &str, result: Result<(), CueError>) {
        if let Err(error) = result {
            self.fail(target, phase, error);
        }
    }

    /// Record a failed transition and stop everything pending for `target`.
    fn fail(&mut self, target: StateRef, phase: &str, error: CueError) {
        let now = self.now();
        warn!("{target} failed during {phase} [{}]: {error}", error.category());
        let stale: Vec<TaskHandle> = match target {
            StateRef::Element(id) => match self.elements.get_mut(id.0 as usize) {
                Some(el) => {
                    el.phase = Phase::Failed;
                    [
                        el.pending_appear.take(),
                        el.pending_disappear.take(),
                        el.pending_finalize.take(),
                    ]
                    .into_iter()
                    .flatten()
                    .collect()
                }
                None => Vec::new(),
            },
            StateRef::Animation(id) => match self.animations.get_mut(id.0 as usize) {
                Some(anim) => {
                    anim.phase = AnimPhase::Failed;
                    anim.tick.take().into_iter().collect()
                }
                None => Vec::new(),
            },
        };
        for handle in stale {
            self.clock.unschedule(handle);
        }
        self.failures.push(Failure {
            target,
            phase: phase.to_string(),
            error,
            time: now,
        });
        self.outputs.push_event(StateEvent::Failed { target, time: now });
    }

    fn schedule_leave(&mut self, target: StateRef, at: f64) {
        let left = match target {
            StateRef::Element(id) => self.elements.get_mut(id.0 as usize).map(|e| &mut e.left),
            StateRef::Animation(id) => self.animations.get_mut(id.0 as usize).map(|a| &mut a.left),
        };
        if let Some(left) = left {
            if !*left {
                *left = true;
                self.clock.schedule(Task::Leave(target), at, None);
            }
        }
    }

    fn appear(&mut self, id: ElementId) -> Result<(), CueError> {
        let now = self.now();
        let el = self.elem_mut(id)?;
        el.pending_appear = None;
        if el.phase != Phase::Pending {
            return Ok(());
        }
        let (widget, layout, index) = (el.widget, el.layout, el.index);
        let parent = match layout {
            Some(owner) => self.elem(owner)?.widget,
            None => self.toolkit.root(),
        };
        self.toolkit
            .attach(parent, widget, index)
            .map_err(CueError::toolkit)?;

        let el = self.elem_mut(id)?;
        el.parent_widget = Some(parent);
        el.on_screen = true;
        el.appear_time = Some(now);
        el.phase = Phase::OnScreen;
        debug!("t={now} appear {}", el.label());
        self.outputs.push_event(StateEvent::Appeared { element: id, time: now });
        self.schedule_leave(StateRef::Element(id), now);
        Ok(())
    }

    fn disappear(&mut self, id: ElementId) -> Result<(), CueError> {
        let now = self.now();
        let el = self.elem_mut(id)?;
        el.pending_disappear = None;
        if el.phase.is_terminal()
            || matches!(el.phase, Phase::Disappeared | Phase::CancelledBeforeStart)
        {
            return Ok(());
        }
        let stale = el.pending_appear.take();
        let (widget, parent) = (el.widget, el.parent_widget);
        if let Some(handle) = stale {
            self.clock.unschedule(handle);
        }
        if let Some(parent) = parent {
            self.toolkit
                .detach(parent, widget)
                .map_err(CueError::toolkit)?;
        }

        let el = self.elem_mut(id)?;
        el.parent_widget = None;
        el.on_screen = false;
        el.disappear_time = Some(now);
        el.phase = Phase::Disappeared;
        debug!("t={now} disappear {}", el.label());
        self.outputs.push_event(StateEvent::Disappeared { element: id, time: now });
        let h = self
            .clock
            .schedule(Task::Finalize(StateRef::Element(id)), now, None);
        self.elem_mut(id)?.pending_finalize = Some(h);
        Ok(())
    }

    fn finalize(&mut self, target: StateRef) -> Result<(), CueError> {
        let now = self.now();
        match target {
            StateRef::Element(id) => {
                let el = self.elem_mut(id)?;
                el.pending_finalize = None;
                if el.phase.is_terminal() {
                    return Ok(());
                }
                el.phase = Phase::Finalized;
                let send_leave = !std::mem::replace(&mut el.left, true);
                let record = ElementRecord {
                    id,
                    name: el.name.clone(),
                    class: el.class.clone(),
                    start_time: el.start_time,
                    end_time: el.end_time,
                    appear_time: el.appear_time,
                    disappear_time: el.disappear_time,
                    params: el.init_values.clone(),
                };
                debug!("t={now} finalize {}", el.label());
                if send_leave {
                    self.outputs.push_event(StateEvent::Leave { target, time: now });
                }
                self.outputs.push_record(record);
            }
            StateRef::Animation(id) => {
                let anim = self.anim_mut(id)?;
                if anim.phase.is_terminal() {
                    return Ok(());
                }
                anim.phase = AnimPhase::Finalized;
                let send_leave = !std::mem::replace(&mut anim.left, true);
                debug!("t={now} finalize {id} after {} ticks", anim.ticks);
                if send_leave {
                    self.outputs.push_event(StateEvent::Leave { target, time: now });
                }
            }
        }
        self.outputs.push_event(StateEvent::Finalized { target, time: now });
        Ok(())
    }

    fn tick(&mut self, id: AnimId, handle: TaskHandle) -> Result<(), CueError> {
        let now = self.now();
        let anim = self.anim(id)?;
        if anim.phase != AnimPhase::Running {
            self.clock.unschedule(handle);
            return Ok(());
        }
        let (target, start, end) = (anim.target, anim.start_time, anim.end_time);
        let needs_initial = anim.initial_params.is_none();
        let names: Vec<String> = if needs_initial {
            anim.anim_params.keys().cloned().collect()
        } else {
            Vec::new()
        };

        let el = self.elem(target)?;
        match el.phase {
            Phase::Failed => return Err(CueError::TargetNotLive { element: target }),
            Phase::Finalized => {
                debug!("t={now} {id} stops with its target {}", el.label());
                self.stop_animation(id, handle)?;
                return Ok(());
            }
            _ => {}
        }
        if needs_initial {
            let widget = el.widget;
            let mut initial = PropertyMap::with_capacity(names.len());
            for name in names {
                let value = self.toolkit.get_property(widget, &name).ok_or_else(|| {
                    CueError::PropertyUnavailable {
                        element: target,
                        name: name.clone(),
                    }
                })?;
                initial.insert(name, value);
            }
            self.anim_mut(id)?.initial_params = Some(initial);
        }

        let mut t = now;
        if let Some(end) = end.filter(|end| now >= *end) {
            t = end;
            self.stop_animation(id, handle)?;
        }

        let anim = self.anim_mut(id)?;
        anim.ticks += 1;
        let values = anim.sample(t - start)?;
        trace!("t={now} {id} tick {} -> {:?}", anim.ticks, values.keys());
        let updates = values
            .into_iter()
            .map(|(name, value)| (name, Param::Const(value)))
            .collect();
        self.live_change(target, updates)
    }

    /// End the tick series and finalize the animation at the current time.
    fn stop_animation(&mut self, id: AnimId, handle: TaskHandle) -> Result<(), CueError> {
        let now = self.now();
        self.clock.unschedule(handle);
        let anim = self.anim_mut(id)?;
        anim.tick = None;
        anim.phase = AnimPhase::Finishing;
        if anim.end_time.map_or(true, |end| end > now) {
            anim.end_time = Some(now);
        }
        self.clock
            .schedule(Task::Finalize(StateRef::Animation(id)), now, None);
        Ok(())
    }

    // ---------- grouping ----------

    /// Complete every closed group whose blocking children all finished and
    /// cancel its remaining non-blocking children.
    fn check_groups(&mut self) {
        let now = self.now();
        let mut leftovers = Vec::new();
        for gi in 0..self.groups.len() {
            let group = &self.groups[gi];
            if group.open || group.is_complete() {
                continue;
            }
            if !group.blocking().all(|t| self.is_finished(t)) {
                continue;
            }
            leftovers.extend(group.non_blocking().filter(|t| !self.is_finished(*t)));
            let gid = group.id;
            self.groups[gi].completed_at = Some(now);
            debug!("t={now} {gid} complete");
            self.outputs
                .push_event(StateEvent::GroupCompleted { group: gid, time: now });
        }
        for target in leftovers {
            if let Err(err) = self.cancel(target, now) {
                warn!("cancel of non-blocking {target} failed: {err}");
            }
        }
    }
}
