//! Lazy reactive property evaluation.
//!
//! Any named attribute of a clip (or of a free-standing dynamic value object)
//! is a [`Binding`]: a constant, a pure function of the current
//! [`FrameContext`], or a delegate that forwards to another object's
//! property. Bindings are evaluated on demand through an [`EvalScope`], which
//! memoizes each `(object, property)` pair once per frame context and turns
//! re-entrant evaluation into a [`MovieError::CircularReference`] fault
//! instead of an infinite loop.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, btree_map},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    core::FrameIndex,
    error::{MovieError, MovieResult},
};

/// Identity of a bindable object, used as half of the evaluation cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Runtime value of a property.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    pub fn as_num(&self) -> MovieResult<f64> {
        match self {
            Self::Num(v) => Ok(*v),
            Self::Text(t) => Err(MovieError::validation(format!(
                "expected a numeric value, found text '{t}'"
            ))),
        }
    }

    /// Textual form; integral numbers format without a fractional part, so a
    /// frame counter bound to a text property reads as `"42"` not `"42.0"`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Num(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Self::Num(v) => format!("{v}"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Num(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Num(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Num(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The per-render-call record consulted by computed bindings.
///
/// Contexts nest: rendering a child clip pushes a new context, and all
/// property reads made during that render see the innermost one.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub frame: FrameIndex,
    /// `frame / frame_count`; 0.0 for unbounded clips.
    pub portion: f64,
    pub owner: ObjectId,
}

pub type ComputedFn = Rc<dyn Fn(&mut EvalScope, FrameContext) -> MovieResult<Value>>;

/// The rule by which a property's value is produced.
#[derive(Clone)]
pub enum Binding {
    Constant(Value),
    Computed(ComputedFn),
    /// Forwards evaluation to `(target, property)`, at any chain depth.
    Delegate(Props, String),
}

impl Binding {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn computed(
        f: impl Fn(&mut EvalScope, FrameContext) -> MovieResult<Value> + 'static,
    ) -> Self {
        Self::Computed(Rc::new(f))
    }

    pub fn delegate(target: &Props, name: impl Into<String>) -> Self {
        Self::Delegate(target.clone(), name.into())
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::Delegate(target, name) => f
                .debug_tuple("Delegate")
                .field(&target.id())
                .field(name)
                .finish(),
        }
    }
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Self::Constant(v)
    }
}

impl From<f64> for Binding {
    fn from(v: f64) -> Self {
        Self::Constant(v.into())
    }
}

impl From<u64> for Binding {
    fn from(v: u64) -> Self {
        Self::Constant(v.into())
    }
}

impl From<i32> for Binding {
    fn from(v: i32) -> Self {
        Self::Constant(v.into())
    }
}

impl From<&str> for Binding {
    fn from(v: &str) -> Self {
        Self::Constant(v.into())
    }
}

impl From<String> for Binding {
    fn from(v: String) -> Self {
        Self::Constant(v.into())
    }
}

/// Ordered name → binding map used by parameterised constructors.
#[derive(Clone, Debug, Default)]
pub struct Params(BTreeMap<String, Binding>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.0.insert(name.into(), binding.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.0.get(name)
    }
}

/// A bindable object: a unique identity plus a name → binding map.
///
/// Structure is write-once: a name can be bound exactly once, and bindings
/// never change afterwards (property *values* still vary per frame through
/// computed bindings).
pub struct PropertySet {
    id: ObjectId,
    bindings: RefCell<BTreeMap<String, Binding>>,
}

/// Shared handle to a [`PropertySet`]. Delegate bindings hold one of these.
pub type Props = Rc<PropertySet>;

impl PropertySet {
    /// A fresh object exposing the frame context as the read-only properties
    /// `frame` and `portion`.
    pub fn new() -> Props {
        let props = Rc::new(Self {
            id: ObjectId::next(),
            bindings: RefCell::new(BTreeMap::new()),
        });
        props.bind_fresh(
            "frame",
            Binding::computed(|_, ctx| Ok(Value::Num(ctx.frame.0 as f64))),
        );
        props.bind_fresh(
            "portion",
            Binding::computed(|_, ctx| Ok(Value::Num(ctx.portion))),
        );
        props
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Register `binding` under `name`. Names are unique per object; a second
    /// bind of the same name is a validation fault rather than a rebind.
    pub fn bind(&self, name: impl Into<String>, binding: impl Into<Binding>) -> MovieResult<()> {
        let name = name.into();
        match self.bindings.borrow_mut().entry(name) {
            btree_map::Entry::Vacant(e) => {
                e.insert(binding.into());
                Ok(())
            }
            btree_map::Entry::Occupied(e) => Err(MovieError::validation(format!(
                "property '{}' is already bound",
                e.key()
            ))),
        }
    }

    /// For every key in `defaults`, bind the supplied override when present,
    /// else the default. Supplied keys absent from `defaults` are ignored.
    pub fn bind_many(&self, supplied: &Params, defaults: Params) -> MovieResult<()> {
        for (name, default) in defaults.0 {
            let binding = supplied.get(&name).cloned().unwrap_or(default);
            self.bind(name, binding)?;
        }
        Ok(())
    }

    /// Insert without the duplicate check. Constructors use this for names
    /// they know are fresh.
    pub(crate) fn bind_fresh(&self, name: &str, binding: Binding) {
        self.bindings.borrow_mut().insert(name.to_string(), binding);
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }
}

impl std::fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySet")
            .field("id", &self.id)
            .field("bindings", &self.bindings.borrow())
            .finish()
    }
}

enum CacheSlot {
    /// Evaluation in flight; observing this is a circular reference.
    Pending,
    Done(Value),
}

struct ScopeFrame {
    ctx: FrameContext,
    cache: HashMap<(ObjectId, String), CacheSlot>,
}

/// The explicit, stack-shaped evaluation context threaded through every
/// render and property read. Each pushed frame owns its evaluation cache, so
/// nothing computed for frame N can leak into frame N+1, and independent
/// scopes (e.g. in tests) cannot interfere.
#[derive(Default)]
pub struct EvalScope {
    stack: Vec<ScopeFrame>,
}

impl EvalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ctx: FrameContext) {
        self.stack.push(ScopeFrame {
            ctx,
            cache: HashMap::new(),
        });
    }

    pub fn pop(&mut self) -> MovieResult<FrameContext> {
        self.stack
            .pop()
            .map(|f| f.ctx)
            .ok_or(MovieError::StackEmpty)
    }

    pub fn current(&self) -> Option<FrameContext> {
        self.stack.last().map(|f| f.ctx)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Portion of the innermost context, or 0.0 outside any context.
    pub fn portion(&self) -> f64 {
        self.current().map(|c| c.portion).unwrap_or(0.0)
    }

    /// Evaluate `props.name` under the innermost context, memoized.
    ///
    /// Outside any context the binding is evaluated immediately and
    /// uncached (introspection reads); computed bindings then see a
    /// synthetic frame-0 context.
    pub fn read(&mut self, props: &PropertySet, name: &str) -> MovieResult<Value> {
        let binding = props.binding(name).ok_or_else(|| {
            MovieError::validation(format!("object has no property '{name}'"))
        })?;

        if self.current().is_none() {
            return self.eval_uncached(props, &binding);
        }

        let key = (props.id(), name.to_string());
        if let Some(top) = self.stack.last() {
            match top.cache.get(&key) {
                Some(CacheSlot::Done(v)) => return Ok(v.clone()),
                Some(CacheSlot::Pending) => return Err(MovieError::circular(name)),
                None => {}
            }
        }

        // Mark in flight before recursing; a failed evaluation leaves the
        // marker behind, which is fine because the whole context is discarded
        // on pop and a fresh context starts from an empty cache.
        if let Some(top) = self.stack.last_mut() {
            top.cache.insert(key.clone(), CacheSlot::Pending);
        }
        let value = self.eval(&binding)?;
        if let Some(top) = self.stack.last_mut() {
            top.cache.insert(key, CacheSlot::Done(value.clone()));
        }
        Ok(value)
    }

    /// [`read`](Self::read) plus numeric coercion, naming the property in the
    /// failure.
    pub fn read_num(&mut self, props: &PropertySet, name: &str) -> MovieResult<f64> {
        self.read(props, name)?.as_num().map_err(|e| {
            MovieError::validation(format!("property '{name}': {e}"))
        })
    }

    pub fn read_text(&mut self, props: &PropertySet, name: &str) -> MovieResult<String> {
        Ok(self.read(props, name)?.to_text())
    }

    fn eval(&mut self, binding: &Binding) -> MovieResult<Value> {
        match binding {
            Binding::Constant(v) => Ok(v.clone()),
            Binding::Computed(f) => {
                let ctx = self.current().ok_or(MovieError::StackEmpty)?;
                f(self, ctx)
            }
            Binding::Delegate(target, name) => self.read(target, name),
        }
    }

    fn eval_uncached(&mut self, props: &PropertySet, binding: &Binding) -> MovieResult<Value> {
        match binding {
            Binding::Constant(v) => Ok(v.clone()),
            Binding::Computed(f) => {
                let ctx = FrameContext {
                    frame: FrameIndex(0),
                    portion: 0.0,
                    owner: props.id(),
                };
                f(self, ctx)
            }
            Binding::Delegate(target, name) => self.read(target, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ctx_for(props: &Props, frame: u64, total: u64) -> FrameContext {
        FrameContext {
            frame: FrameIndex(frame),
            portion: frame as f64 / total as f64,
            owner: props.id(),
        }
    }

    #[test]
    fn constants_read_back() {
        let props = PropertySet::new();
        props.bind("x", 3.0).unwrap();
        props.bind("label", "hi").unwrap();

        let mut scope = EvalScope::new();
        assert_eq!(scope.read(&props, "x").unwrap(), Value::Num(3.0));
        assert_eq!(scope.read_text(&props, "label").unwrap(), "hi");
    }

    #[test]
    fn rebinding_is_rejected() {
        let props = PropertySet::new();
        props.bind("x", 1.0).unwrap();
        assert!(matches!(
            props.bind("x", 2.0),
            Err(MovieError::Validation(_))
        ));
    }

    #[test]
    fn computed_sees_innermost_context() {
        let props = PropertySet::new();
        let mut scope = EvalScope::new();
        scope.push(ctx_for(&props, 25, 100));
        assert_eq!(scope.read_num(&props, "portion").unwrap(), 0.25);
        assert_eq!(scope.read_num(&props, "frame").unwrap(), 25.0);
        scope.pop().unwrap();
    }

    #[test]
    fn evaluation_is_memoized_per_context() {
        let props = PropertySet::new();
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();
        props
            .bind(
                "x",
                Binding::computed(move |_, ctx| {
                    seen.set(seen.get() + 1);
                    Ok(Value::Num(ctx.frame.0 as f64 * 2.0))
                }),
            )
            .unwrap();

        let mut scope = EvalScope::new();
        scope.push(ctx_for(&props, 4, 10));
        assert_eq!(scope.read_num(&props, "x").unwrap(), 8.0);
        assert_eq!(scope.read_num(&props, "x").unwrap(), 8.0);
        assert_eq!(calls.get(), 1);
        scope.pop().unwrap();

        // A fresh context re-evaluates.
        scope.push(ctx_for(&props, 5, 10));
        assert_eq!(scope.read_num(&props, "x").unwrap(), 10.0);
        assert_eq!(calls.get(), 2);
        scope.pop().unwrap();
    }

    #[test]
    fn delegate_forwards_and_chains() {
        let a = PropertySet::new();
        a.bind("x", 7.0).unwrap();
        let b = PropertySet::new();
        b.bind("x", Binding::delegate(&a, "x")).unwrap();
        let c = PropertySet::new();
        c.bind("x", Binding::delegate(&b, "x")).unwrap();

        let mut scope = EvalScope::new();
        scope.push(ctx_for(&c, 0, 1));
        assert_eq!(scope.read_num(&c, "x").unwrap(), 7.0);
        scope.pop().unwrap();

        // Uncached introspection read also resolves the chain.
        assert_eq!(scope.read_num(&c, "x").unwrap(), 7.0);
    }

    #[test]
    fn circular_reference_faults_and_names_the_property() {
        let props = PropertySet::new();
        let w = Rc::downgrade(&props);
        props
            .bind(
                "a",
                Binding::computed(move |scope, _| {
                    let props = w.upgrade().unwrap();
                    Ok(Value::Num(scope.read_num(&props, "b")? + 1.0))
                }),
            )
            .unwrap();
        let w = Rc::downgrade(&props);
        props
            .bind(
                "b",
                Binding::computed(move |scope, _| {
                    let props = w.upgrade().unwrap();
                    Ok(Value::Num(scope.read_num(&props, "a")? + 1.0))
                }),
            )
            .unwrap();

        let mut scope = EvalScope::new();
        scope.push(ctx_for(&props, 0, 1));
        match scope.read(&props, "a") {
            Err(MovieError::CircularReference { name }) => assert_eq!(name, "a"),
            other => panic!("expected a circular reference fault, got {other:?}"),
        }
        scope.pop().unwrap();

        // A structural cycle faults identically in a fresh context; the
        // PENDING marker from the failed frame does not leak.
        scope.push(ctx_for(&props, 1, 2));
        assert!(scope.read(&props, "a").is_err());
        scope.pop().unwrap();
    }

    #[test]
    fn transient_cycle_recovers_in_a_fresh_context() {
        // 'a' only references itself on frame 0.
        let props = PropertySet::new();
        {
            let props_w = Rc::downgrade(&props);
            props
                .bind(
                    "a",
                    Binding::computed(move |scope, ctx| {
                        if ctx.frame.0 == 0 {
                            let props = props_w.upgrade().unwrap();
                            scope.read(&props, "a")
                        } else {
                            Ok(Value::Num(1.0))
                        }
                    }),
                )
                .unwrap();
        }

        let mut scope = EvalScope::new();
        scope.push(ctx_for(&props, 0, 2));
        assert!(scope.read(&props, "a").is_err());
        scope.pop().unwrap();

        scope.push(ctx_for(&props, 1, 2));
        assert_eq!(scope.read_num(&props, "a").unwrap(), 1.0);
        scope.pop().unwrap();
    }

    #[test]
    fn pop_on_empty_stack_is_a_fault() {
        let mut scope = EvalScope::new();
        assert!(matches!(scope.pop(), Err(MovieError::StackEmpty)));
    }

    #[test]
    fn bind_many_prefers_supplied_over_defaults() {
        let props = PropertySet::new();
        let supplied = Params::new().with("frequency", 13.0).with("ignored", 9.0);
        let defaults = Params::new().with("frequency", 1.0).with("phase", 0.0);
        props.bind_many(&supplied, defaults).unwrap();

        let mut scope = EvalScope::new();
        assert_eq!(scope.read_num(&props, "frequency").unwrap(), 13.0);
        assert_eq!(scope.read_num(&props, "phase").unwrap(), 0.0);
        assert!(!props.has("ignored"));
    }

    #[test]
    fn nested_contexts_cache_independently() {
        let props = PropertySet::new();
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();
        props
            .bind(
                "x",
                Binding::computed(move |_, ctx| {
                    seen.set(seen.get() + 1);
                    Ok(Value::Num(ctx.portion))
                }),
            )
            .unwrap();

        let mut scope = EvalScope::new();
        scope.push(ctx_for(&props, 1, 10));
        assert_eq!(scope.read_num(&props, "x").unwrap(), 0.1);

        // A nested context (child clip render) gets its own cache and its
        // own portion.
        scope.push(ctx_for(&props, 1, 4));
        assert_eq!(scope.read_num(&props, "x").unwrap(), 0.25);
        scope.pop().unwrap();

        // Back in the outer context, the outer cached value is intact.
        assert_eq!(scope.read_num(&props, "x").unwrap(), 0.1);
        assert_eq!(calls.get(), 2);
        scope.pop().unwrap();
    }
}
