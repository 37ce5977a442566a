//! Generators and the generator registry.
//!
//! A [`Generator`] is a named build function from a parameter value to an
//! [`Instantiable`]. Binding a generator to a parameter value produces a
//! [`GeneratorCall`], which compares and hashes by generator identity and
//! parameter value. The [`Registry`] expands each distinct call at most once.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use anyhow::anyhow;
use arcstr::ArcStr;
use tracing::{event, span, Level};

use crate::error::{CyclePath, Error, Result};
use crate::module::{Instantiable, Module};

/// A parameter value usable as a generator memoization key.
///
/// Equality and hashing must be structural.
pub trait Param: Clone + Debug + Hash + Eq + Send + Sync + 'static {}
impl<T: Clone + Debug + Hash + Eq + Send + Sync + 'static> Param for T {}

/// A unique generator identifier.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct GeneratorId(u64);

static NEXT_GENERATOR_ID: AtomicU64 = AtomicU64::new(0);

type BuildFn<P> = dyn Fn(&P) -> anyhow::Result<Instantiable> + Send + Sync;

/// A named function from a parameter value of type `P` to a module.
pub struct Generator<P> {
    id: GeneratorId,
    name: ArcStr,
    build: Arc<BuildFn<P>>,
}

impl<P> Clone for Generator<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            build: self.build.clone(),
        }
    }
}

impl<P> Debug for Generator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<P: Param> Generator<P> {
    /// Creates a new generator.
    ///
    /// Every generator has a distinct identity, even if two generators share a name
    /// or a build function.
    pub fn new<T, F>(name: impl Into<ArcStr>, build: F) -> Self
    where
        T: Into<Instantiable>,
        F: Fn(&P) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            id: GeneratorId(NEXT_GENERATOR_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            build: Arc::new(move |params| build(params).map(Into::into)),
        }
    }

    /// The identity of this generator.
    #[inline]
    pub fn id(&self) -> GeneratorId {
        self.id
    }

    /// The name of this generator.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Binds this generator to a parameter value.
    pub fn call(&self, params: P) -> GeneratorCall {
        GeneratorCall {
            inner: Arc::new(TypedCall {
                generator: self.clone(),
                params,
            }),
        }
    }
}

trait ErasedCall: Send + Sync {
    fn generator_id(&self) -> GeneratorId;
    fn generator_name(&self) -> &ArcStr;
    fn params_debug(&self) -> String;
    fn build(&self) -> anyhow::Result<Instantiable>;
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn ErasedCall) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

struct TypedCall<P> {
    generator: Generator<P>,
    params: P,
}

impl<P: Param> ErasedCall for TypedCall<P> {
    fn generator_id(&self) -> GeneratorId {
        self.generator.id
    }

    fn generator_name(&self) -> &ArcStr {
        &self.generator.name
    }

    fn params_debug(&self) -> String {
        format!("{:?}", self.params)
    }

    fn build(&self) -> anyhow::Result<Instantiable> {
        (self.generator.build)(&self.params)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ErasedCall) -> bool {
        other
            .as_any()
            .downcast_ref::<TypedCall<P>>()
            .is_some_and(|other| {
                other.generator.id == self.generator.id && other.params == self.params
            })
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.generator.id.hash(&mut state);
        self.params.hash(&mut state);
    }
}

/// A generator bound to a parameter value.
///
/// Two calls are equal if they refer to the same generator
/// and have structurally equal parameters.
#[derive(Clone)]
pub struct GeneratorCall {
    inner: Arc<dyn ErasedCall>,
}

impl GeneratorCall {
    /// The identity of the called generator.
    #[inline]
    pub fn generator_id(&self) -> GeneratorId {
        self.inner.generator_id()
    }

    /// The name of the called generator.
    #[inline]
    pub fn generator_name(&self) -> &ArcStr {
        self.inner.generator_name()
    }

    /// The parameter value, if it is of type `P`.
    pub fn params<P: Param>(&self) -> Option<&P> {
        self.inner
            .as_any()
            .downcast_ref::<TypedCall<P>>()
            .map(|call| &call.params)
    }

    /// The debug rendering of the parameter value.
    pub fn params_debug(&self) -> String {
        self.inner.params_debug()
    }
}

impl PartialEq for GeneratorCall {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.dyn_eq(&*other.inner)
    }
}

impl Eq for GeneratorCall {}

impl Hash for GeneratorCall {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.dyn_hash(state);
    }
}

impl Debug for GeneratorCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GeneratorCall({}, {})",
            self.generator_name(),
            self.params_debug()
        )
    }
}

enum Slot {
    Expanding(ThreadId),
    Done(Arc<Module>),
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<GeneratorCall, Slot>,
    /// The calls each thread is currently expanding, outermost first.
    stacks: HashMap<ThreadId, Vec<GeneratorCall>>,
    /// The call each blocked thread is waiting on.
    waiting: HashMap<ThreadId, GeneratorCall>,
    expansions: u64,
    hits: u64,
}

impl RegistryState {
    fn owner(&self, call: &GeneratorCall) -> Option<ThreadId> {
        match self.slots.get(call) {
            Some(Slot::Expanding(owner)) => Some(*owner),
            _ => None,
        }
    }

    /// Returns `true` if `thread` is transitively waiting on an expansion owned by `target`.
    fn waits_on(&self, mut thread: ThreadId, target: ThreadId) -> bool {
        for _ in 0..=self.waiting.len() {
            let Some(next) = self.waiting.get(&thread).and_then(|call| self.owner(call)) else {
                return false;
            };
            if next == target {
                return true;
            }
            thread = next;
        }
        false
    }

    fn stack_from<'a>(
        &'a self,
        thread: ThreadId,
        entry: &GeneratorCall,
    ) -> impl Iterator<Item = ArcStr> + 'a {
        let stack = self.stacks.get(&thread).map(Vec::as_slice).unwrap_or_default();
        let start = stack.iter().position(|call| call == entry).unwrap_or(0);
        stack[start..]
            .iter()
            .map(|call| call.generator_name().clone())
    }

    fn cycle_path(&self, me: ThreadId, call: &GeneratorCall) -> CyclePath {
        let mut segments = Vec::new();
        let mut target = call;
        for _ in 0..=self.waiting.len() {
            match self.owner(target) {
                Some(owner) if owner != me => {
                    segments.push((owner, target));
                    match self.waiting.get(&owner) {
                        Some(next) => target = next,
                        None => break,
                    }
                }
                _ => break,
            }
        }

        let mut names: Vec<ArcStr> = self.stack_from(me, target).collect();
        for (thread, entry) in segments {
            names.extend(self.stack_from(thread, entry));
        }
        names.push(target.generator_name().clone());
        CyclePath(names)
    }
}

/// A memoizing cache of generator expansions.
///
/// A registry expands each distinct [`GeneratorCall`] at most once and returns the
/// same module for every later request of an equal call. The registry may be shared
/// between threads. A thread requesting a call that another thread is expanding
/// blocks until the expansion completes.
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
    cond: Condvar,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("entries", &state.slots.len())
            .field("expansions", &state.expansions)
            .field("hits", &state.hits)
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The number of times a build function has been invoked.
    pub fn num_expansions(&self) -> u64 {
        self.lock().expansions
    }

    /// The number of requests answered from the cache.
    pub fn num_hits(&self) -> u64 {
        self.lock().hits
    }

    /// The memoized module for `call`, if it has been expanded.
    pub fn get(&self, call: &GeneratorCall) -> Option<Arc<Module>> {
        match self.lock().slots.get(call) {
            Some(Slot::Done(module)) => Some(module.clone()),
            _ => None,
        }
    }

    /// Returns the module produced by `call`, invoking its build function
    /// if no equal call has been expanded yet.
    ///
    /// Generator calls nested within the returned module are not expanded.
    pub fn expand(&self, call: &GeneratorCall) -> Result<Arc<Module>> {
        let _guard = span!(
            Level::INFO,
            "expanding generator",
            generator = %call.generator_name()
        )
        .entered();
        let me = thread::current().id();

        let mut state = self.lock();
        loop {
            let owner = match state.slots.get(call) {
                Some(Slot::Done(module)) => {
                    let module = module.clone();
                    state.hits += 1;
                    event!(Level::DEBUG, "generator cache hit");
                    return Ok(module);
                }
                Some(Slot::Expanding(owner)) => *owner,
                None => break,
            };
            if owner == me || state.waits_on(owner, me) {
                let path = state.cycle_path(me, call);
                event!(Level::ERROR, %path, "generator cycle detected");
                return Err(Error::Cycle(path));
            }
            state.waiting.insert(me, call.clone());
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            state.waiting.remove(&me);
        }

        state.slots.insert(call.clone(), Slot::Expanding(me));
        state.stacks.entry(me).or_default().push(call.clone());
        state.expansions += 1;
        drop(state);

        event!(Level::DEBUG, params = %call.params_debug(), "generator cache miss");
        let result = self.build(call);

        let mut state = self.lock();
        let emptied = match state.stacks.get_mut(&me) {
            Some(stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => false,
        };
        if emptied {
            state.stacks.remove(&me);
        }
        match &result {
            Ok(module) => {
                state.slots.insert(call.clone(), Slot::Done(module.clone()));
            }
            Err(_) => {
                state.slots.remove(call);
            }
        }
        drop(state);
        self.cond.notify_all();

        result
    }

    fn build(&self, call: &GeneratorCall) -> Result<Arc<Module>> {
        let built = panic::catch_unwind(AssertUnwindSafe(|| call.inner.build()))
            .unwrap_or_else(|payload| {
                Err(anyhow!(
                    "generator panicked: {}",
                    panic_message(payload.as_ref())
                ))
            })
            .map_err(|err| Error::expansion(call.generator_name(), call.params_debug(), err))?;

        match built {
            Instantiable::Module(mut module) => {
                if module.name.is_empty() {
                    Arc::make_mut(&mut module).name = call.generator_name().clone();
                }
                Ok(module)
            }
            Instantiable::Generator(next) => self.expand(&next),
            other => Err(Error::expansion(
                call.generator_name(),
                call.params_debug(),
                anyhow!(
                    "generator must return a module, but returned `{}`",
                    other.name()
                ),
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use anyhow::bail;
    use rust_decimal_macros::dec;
    use test_log::test;

    use super::*;
    use crate::primitives::PrimitiveCall;
    use crate::signal::PortDir;

    #[derive(Clone, Debug, Hash, Eq, PartialEq)]
    struct Width {
        bits: usize,
    }

    fn counting_generator() -> (Generator<Width>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let gen = Generator::new("buffer", move |params: &Width| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut m = Module::new(format!("buffer_{}", params.bits));
            m.add_port("a", params.bits, PortDir::Input);
            m.add_port("y", params.bits, PortDir::Output);
            Ok(m)
        });
        (gen, count)
    }

    #[test]
    fn equal_params_expand_once() {
        let (gen, count) = counting_generator();
        let registry = Registry::new();

        let a = registry.expand(&gen.call(Width { bits: 4 })).unwrap();
        let b = registry.expand(&gen.call(Width { bits: 4 })).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.num_expansions(), 1);
        assert_eq!(registry.num_hits(), 1);
    }

    #[test]
    fn distinct_params_expand_separately() {
        let (gen, count) = counting_generator();
        let registry = Registry::new();

        let a = registry.expand(&gen.call(Width { bits: 4 })).unwrap();
        let b = registry.expand(&gen.call(Width { bits: 8 })).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "buffer_4");
        assert_eq!(b.name(), "buffer_8");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn calls_of_distinct_generators_differ() {
        let (gen1, _) = counting_generator();
        let (gen2, _) = counting_generator();
        assert_eq!(gen1.call(Width { bits: 1 }), gen1.call(Width { bits: 1 }));
        assert_ne!(gen1.call(Width { bits: 1 }), gen2.call(Width { bits: 1 }));
        assert_eq!(
            gen1.call(Width { bits: 3 }).params::<Width>(),
            Some(&Width { bits: 3 })
        );
        assert_eq!(gen1.call(Width { bits: 3 }).params::<u32>(), None);
    }

    #[test]
    fn failed_expansion_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let gen = Generator::new("flaky", move |_: &()| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                bail!("not yet");
            }
            Ok(Module::new("flaky"))
        });
        let registry = Registry::new();

        let err = registry.expand(&gen.call(())).unwrap_err();
        match err {
            Error::GeneratorExpansion { generator, cause, .. } => {
                assert_eq!(generator, "flaky");
                assert_eq!(cause.to_string(), "not yet");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.expand(&gen.call(())).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panics_become_expansion_errors() {
        let gen = Generator::new("explodes", |_: &()| -> anyhow::Result<Module> {
            panic!("boom");
        });
        let err = Registry::new().expand(&gen.call(())).unwrap_err();
        assert!(matches!(err, Error::GeneratorExpansion { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn non_module_results_are_rejected() {
        let gen = Generator::new("resistor", |_: &()| {
            Ok(PrimitiveCall::IdealResistor(dec!(1000)))
        });
        let err = Registry::new().expand(&gen.call(())).unwrap_err();
        assert!(matches!(err, Error::GeneratorExpansion { .. }));
        assert!(err.to_string().contains("must return a module"));
    }

    #[test]
    fn returned_calls_are_unwound() {
        let (inner, count) = counting_generator();
        let outer = Generator::new("wrapper", move |params: &Width| Ok(inner.call(params.clone())));
        let registry = Registry::new();

        let module = registry.expand(&outer.call(Width { bits: 2 })).unwrap();
        assert_eq!(module.name(), "buffer_2");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn self_returning_generator_is_a_cycle() {
        let gen: Arc<Mutex<Option<Generator<()>>>> = Arc::new(Mutex::new(None));
        let handle = gen.clone();
        let ouroboros = Generator::new("ouroboros", move |_: &()| {
            let gen = handle.lock().unwrap();
            Ok(gen.as_ref().unwrap().call(()))
        });
        *gen.lock().unwrap() = Some(ouroboros.clone());

        let err = Registry::new().expand(&ouroboros.call(())).unwrap_err();
        match err {
            Error::Cycle(path) => assert_eq!(path.names(), &["ouroboros", "ouroboros"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_names_take_the_generator_name() {
        let gen = Generator::new("unnamed", |_: &()| Ok(Module::default()));
        let module = Registry::new().expand(&gen.call(())).unwrap();
        assert_eq!(module.name(), "unnamed");
    }

    #[test]
    fn concurrent_requests_expand_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let gen = Generator::new("slow", move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(Module::new("slow"))
        });
        let registry = Registry::new();

        let modules: Vec<Arc<Module>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.expand(&gen.call(())).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(modules.iter().all(|m| Arc::ptr_eq(m, &modules[0])));
        assert_eq!(registry.num_hits(), 7);
    }
}
