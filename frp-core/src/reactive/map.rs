//! Per-element Combinators
//!
//! [`map`], [`filter`] and [`map_cache`] read a node whose value is a
//! [`Sequence`] and submit one unit of work per element to the executor.
//! The units report to a fan-in collector; whichever unit completes the
//! collection commits the resulting [`VectorView`].
//!
//! # Caching
//!
//! [`map_cache`] keeps, next to every commit, a table from input element to
//! its position in that commit. The next evaluation looks each element up in
//! the table of the commit it replaces and copies the previous result instead
//! of calling the function again. The table is rebuilt from scratch on every
//! commit.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use super::comparator::{Comparator, Equal};
use super::derived::{derive, Derived, Strategy, Submit};
use super::executor::{Executor, IntoExecuteOn};
use super::transform::Produced;
use crate::graph::{
    AppendCollector, Commit, FixedSizeCollector, Generator, Node, Revisioned, Sequence,
    VectorView,
};

/// Element type of the sequence held by node `N`.
type Element<N> = <<N as Node>::Value as Sequence>::Item;

/// Result type of mapping the elements of node `N` with `F`.
type Mapped<F, N> = Produced<F, (Element<N>,)>;

/// State shared by the units of work of one evaluation.
struct Round<Q, K, T, M = ()> {
    input: Revisioned<Q>,
    collector: K,
    submit: Submit<T, M>,
}

impl<Q: Sequence, K, T, M> Round<Q, K, T, M> {
    fn element(&self, index: usize) -> &Q::Item {
        &self.input.value().as_slice()[index]
    }
}

struct MapElements<E, F> {
    executor: E,
    function: Arc<F>,
}

impl<Q, E, F> Strategy<(Q,)> for MapElements<E, F>
where
    Q: Sequence,
    E: Executor,
    F: Generator<(Q::Item,)>,
{
    type Output = VectorView<F::Output>;
    type Memo = ();

    fn generate(
        &self,
        (input,): (Revisioned<Q>,),
        _previous: Option<Arc<Commit<Self::Output>>>,
        submit: Submit<Self::Output>,
    ) {
        let len = input.value().as_slice().len();
        if len == 0 {
            submit.commit(VectorView::empty(), ());
            return;
        }

        let round = Arc::new(Round {
            input,
            collector: FixedSizeCollector::new(len),
            submit,
        });
        for index in 0..len {
            let round = Arc::clone(&round);
            let function = Arc::clone(&self.function);
            self.executor.execute(Box::new(move || {
                let value = function.invoke((round.element(index),));
                if round.collector.construct(index, value) {
                    round.submit.commit(round.collector.finish(), ());
                }
            }));
        }
    }
}

struct FilterElements<E, F> {
    executor: E,
    function: Arc<F>,
}

impl<Q, E, F> Strategy<(Q,)> for FilterElements<E, F>
where
    Q: Sequence,
    Q::Item: Clone,
    E: Executor,
    F: Generator<(Q::Item,), Output = bool>,
{
    type Output = VectorView<Q::Item>;
    type Memo = ();

    fn generate(
        &self,
        (input,): (Revisioned<Q>,),
        _previous: Option<Arc<Commit<Self::Output>>>,
        submit: Submit<Self::Output>,
    ) {
        let len = input.value().as_slice().len();
        if len == 0 {
            submit.commit(VectorView::empty(), ());
            return;
        }

        let round = Arc::new(Round {
            input,
            collector: AppendCollector::new(len),
            submit,
        });
        for index in 0..len {
            let round = Arc::clone(&round);
            let function = Arc::clone(&self.function);
            self.executor.execute(Box::new(move || {
                let element = round.element(index);
                let done = if function.invoke((element,)) {
                    round.collector.construct(index, element.clone())
                } else {
                    round.collector.skip()
                };
                if done {
                    round.submit.commit(round.collector.finish(), ());
                }
            }));
        }
    }
}

/// Position of each input element in the commit it was installed with.
type Cache<K, H> = HashMap<K, usize, H>;

struct CachedElements<E, F, H> {
    executor: E,
    function: Arc<F>,
    hasher: H,
}

impl<Q, T, H> Round<Q, FixedSizeCollector<T>, VectorView<T>, Cache<Q::Item, H>>
where
    Q: Sequence,
    Q::Item: Eq + Hash + Clone,
    T: 'static,
    H: BuildHasher + Clone + 'static,
{
    fn deliver(&self, index: usize, value: T, hasher: &H) {
        if !self.collector.construct(index, value) {
            return;
        }
        let elements = self.input.value().as_slice();
        let mut cache = Cache::with_capacity_and_hasher(elements.len(), hasher.clone());
        for (position, element) in elements.iter().enumerate() {
            cache.entry(element.clone()).or_insert(position);
        }
        self.submit.commit(self.collector.finish(), cache);
    }
}

impl<Q, E, F, H> Strategy<(Q,)> for CachedElements<E, F, H>
where
    Q: Sequence,
    Q::Item: Eq + Hash + Clone,
    E: Executor,
    F: Generator<(Q::Item,)>,
    F::Output: Clone,
    H: BuildHasher + Clone + Send + Sync + 'static,
{
    type Output = VectorView<F::Output>;
    type Memo = Cache<Q::Item, H>;

    fn generate(
        &self,
        (input,): (Revisioned<Q>,),
        previous: Option<Arc<Commit<Self::Output, Self::Memo>>>,
        submit: Submit<Self::Output, Self::Memo>,
    ) {
        // The element dependency sits at index 0 and is the one allowed to move.
        let previous =
            previous.filter(|previous| previous.revisions().covers_except(submit.revisions(), 0));

        let len = input.value().as_slice().len();
        if len == 0 {
            let cache = Cache::with_hasher(self.hasher.clone());
            submit.commit(VectorView::empty(), cache);
            return;
        }

        let round = Arc::new(Round {
            input,
            collector: FixedSizeCollector::new(len),
            submit,
        });
        for index in 0..len {
            let element = round.element(index);
            let cached = previous.as_ref().and_then(|previous| {
                let position = *previous.memo().get(element)?;
                previous.value().get(position).cloned()
            });

            match cached {
                Some(value) => round.deliver(index, value, &self.hasher),
                None => {
                    let round = Arc::clone(&round);
                    let function = Arc::clone(&self.function);
                    let hasher = self.hasher.clone();
                    self.executor.execute(Box::new(move || {
                        let value = function.invoke((round.element(index),));
                        round.deliver(index, value, &hasher);
                    }));
                }
            }
        }
    }
}

/// Apply `function` to every element of `dependency`.
///
/// Each element is a separate unit of work on the function's executor, so
/// with [`execute_on`](super::execute_on) and a [`ThreadPool`](super::ThreadPool)
/// the elements are processed in parallel. The result keeps the input order.
pub fn map<F, N>(function: F, dependency: N) -> Derived<VectorView<Mapped<F, N>>>
where
    N: Node,
    N::Value: Sequence,
    F: IntoExecuteOn<(Element<N>,)>,
    Mapped<F, N>: PartialEq,
{
    map_with(function, dependency, Equal)
}

/// [`map`] with an explicit comparator for the resulting view.
///
/// Use [`Elementwise`](super::Elementwise) to compare the views element by
/// element with a custom element comparator.
pub fn map_with<F, N, C>(
    function: F,
    dependency: N,
    comparator: C,
) -> Derived<VectorView<Mapped<F, N>>>
where
    N: Node,
    N::Value: Sequence,
    F: IntoExecuteOn<(Element<N>,)>,
    C: Comparator<VectorView<Mapped<F, N>>>,
{
    let (executor, function) = function.into_execute_on().into_parts();
    let strategy = MapElements {
        executor,
        function: Arc::new(function),
    };
    derive((dependency,), strategy, comparator)
}

/// Keep the elements of `dependency` for which `predicate` returns `true`.
///
/// Accepted elements keep their relative input order.
pub fn filter<F, N>(predicate: F, dependency: N) -> Derived<VectorView<Element<N>>>
where
    N: Node,
    N::Value: Sequence,
    Element<N>: Clone + PartialEq,
    F: IntoExecuteOn<(Element<N>,)>,
    F::Function: Generator<(Element<N>,), Output = bool>,
{
    filter_with(predicate, dependency, Equal)
}

/// [`filter`] with an explicit comparator for the resulting view.
pub fn filter_with<F, N, C>(
    predicate: F,
    dependency: N,
    comparator: C,
) -> Derived<VectorView<Element<N>>>
where
    N: Node,
    N::Value: Sequence,
    Element<N>: Clone,
    F: IntoExecuteOn<(Element<N>,)>,
    F::Function: Generator<(Element<N>,), Output = bool>,
    C: Comparator<VectorView<Element<N>>>,
{
    let (executor, function) = predicate.into_execute_on().into_parts();
    let strategy = FilterElements {
        executor,
        function: Arc::new(function),
    };
    derive((dependency,), strategy, comparator)
}

/// [`map`] that reuses the previous result for elements it has already seen.
///
/// Elements are looked up by `Hash` and `Eq`; the previous results are copied
/// with `Clone`.
pub fn map_cache<F, N>(function: F, dependency: N) -> Derived<VectorView<Mapped<F, N>>>
where
    N: Node,
    N::Value: Sequence,
    Element<N>: Eq + Hash + Clone,
    F: IntoExecuteOn<(Element<N>,)>,
    Mapped<F, N>: Clone + PartialEq,
{
    map_cache_with(function, dependency, Equal, RandomState::new())
}

/// [`map_cache`] with an explicit comparator for the resulting view and an
/// explicit hasher for the element table.
pub fn map_cache_with<F, N, C, H>(
    function: F,
    dependency: N,
    comparator: C,
    hasher: H,
) -> Derived<VectorView<Mapped<F, N>>>
where
    N: Node,
    N::Value: Sequence,
    Element<N>: Eq + Hash + Clone,
    F: IntoExecuteOn<(Element<N>,)>,
    Mapped<F, N>: Clone,
    C: Comparator<VectorView<Mapped<F, N>>>,
    H: BuildHasher + Clone + Send + Sync + 'static,
{
    let (executor, function) = function.into_execute_on().into_parts();
    let strategy = CachedElements {
        executor,
        function: Arc::new(function),
        hasher,
    };
    derive((dependency,), strategy, comparator)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{execute_on, source, Elementwise, TaskQueue, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn values<T: Clone + Send + Sync + 'static>(node: &Derived<VectorView<T>>) -> Vec<T> {
        node.value().unwrap().iter().cloned().collect()
    }

    #[test]
    fn map_keeps_input_order() {
        let numbers = source(vec![1, 2, 3, 4]);
        let labels = map(|value: &i32| value.to_string(), numbers.clone());

        assert_eq!(values(&labels), vec!["1", "2", "3", "4"]);
        numbers.assign(vec![7]);
        assert_eq!(values(&labels), vec!["7"]);
    }

    #[test]
    fn map_of_empty_sequence_is_empty() {
        let numbers = source(Vec::<i32>::new());
        let doubled = map(|value: &i32| value * 2, numbers);

        assert!(doubled.value().unwrap().is_empty());
        assert_eq!(doubled.revision(), 1);
    }

    #[test]
    fn map_accepts_fixed_size_arrays() {
        let numbers = source([1, 3, 5]);
        let squares = map(|value: &i32| value * value, numbers);

        assert_eq!(values(&squares), vec![1, 9, 25]);
    }

    #[test]
    fn map_with_elementwise_comparator() {
        let numbers = source(vec![1, 3, 5]);
        let same = map_with(
            |value: &i32| *value,
            numbers.clone(),
            Elementwise(|a: &i32, b: &i32| a % 2 == b % 2),
        );
        let echo = transform_echo(&same);

        numbers.assign(vec![5, 7, 9]);
        assert_eq!(values(&echo), vec![1, 3, 5]);

        numbers.assign(vec![1, 2, 3]);
        assert_eq!(values(&echo), vec![1, 2, 3]);
    }

    fn transform_echo(node: &Derived<VectorView<i32>>) -> Derived<VectorView<i32>> {
        crate::reactive::transform(|view: &VectorView<i32>| view.clone(), (node.clone(),))
    }

    #[test]
    fn map_completes_on_the_last_unit() {
        let queue = Arc::new(TaskQueue::new());
        let numbers = source(vec![1, 2, 3]);
        let doubled = map(execute_on(queue.clone(), |value: &i32| value * 2), numbers);

        assert_eq!(queue.len(), 3);
        assert!(queue.run_one());
        assert!(queue.run_one());
        assert!(!doubled.is_set());

        assert!(queue.run_one());
        assert_eq!(values(&doubled), vec![2, 4, 6]);
    }

    #[test]
    fn map_on_thread_pool() {
        let pool = Arc::new(ThreadPool::new(4).unwrap());
        let numbers = source((0..100).collect::<Vec<i32>>());
        let squares = map(execute_on(pool.clone(), |value: &i32| value * value), numbers);

        pool.wait_idle();
        let expected: Vec<i32> = (0..100).map(|value| value * value).collect();
        assert_eq!(values(&squares), expected);
    }

    #[test]
    fn filter_keeps_matching_elements_in_order() {
        let numbers = source(vec![5, 1, 4, 2, 3]);
        let large = filter(|value: &i32| *value > 2, numbers.clone());

        assert_eq!(values(&large), vec![5, 4, 3]);
        numbers.assign(vec![1, 2]);
        assert!(large.value().unwrap().is_empty());
    }

    #[test]
    fn filter_out_of_order_completion_keeps_order() {
        let queue = Arc::new(TaskQueue::new());
        let numbers = source(vec![1, 2, 3, 4, 5, 6]);
        let even = filter(execute_on(queue.clone(), |value: &i32| value % 2 == 0), numbers);

        queue.run_all_reversed();
        assert_eq!(values(&even), vec![2, 4, 6]);
    }

    #[test]
    fn filter_with_comparator() {
        let numbers = source(vec![1, 2, 3]);
        let positive = filter_with(
            |value: &i32| *value > 0,
            numbers.clone(),
            |a: &VectorView<i32>, b: &VectorView<i32>| a.len() == b.len(),
        );
        let echo = transform_echo(&positive);

        numbers.assign(vec![4, 5, 6]);
        assert_eq!(values(&echo), vec![1, 2, 3]);
    }

    #[test]
    fn map_cache_reuses_previous_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            move |value: &i32| {
                calls.fetch_add(1, Ordering::SeqCst);
                value * 10
            }
        };
        let numbers = source(vec![1, 2, 3]);
        let scaled = map_cache(counted, numbers.clone());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        numbers.assign(vec![3, 2, 4]);
        assert_eq!(values(&scaled), vec![30, 20, 40]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn map_cache_forgets_elements_that_left() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            move |value: &i32| {
                calls.fetch_add(1, Ordering::SeqCst);
                *value
            }
        };
        let numbers = source(vec![1]);
        let same = map_cache(counted, numbers.clone());

        numbers.assign(vec![2]);
        numbers.assign(vec![1]);
        assert_eq!(values(&same), vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn map_cache_with_custom_hasher() {
        let numbers = source(vec![String::from("a"), String::from("bb")]);
        let lengths = map_cache_with(
            |value: &String| value.len(),
            numbers,
            Equal,
            std::collections::hash_map::RandomState::new(),
        );

        assert_eq!(values(&lengths), vec![1, 2]);
    }
}
