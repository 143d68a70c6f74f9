//! Whole-value combinator.

use std::sync::Arc;

use super::comparator::{Comparator, Equal};
use super::derived::{derive, Derived, Strategy, Submit};
use super::executor::{Executor, IntoExecuteOn};
use crate::graph::{Arguments, Commit, Dependencies, Generator};

/// Value produced by the function `F` accepts for arguments `Args`.
pub(crate) type Produced<F, Args> =
    <<F as IntoExecuteOn<Args>>::Function as Generator<Args>>::Output;

/// Calls the generator once with every dependency value.
struct Whole<E, F> {
    executor: E,
    function: Arc<F>,
}

impl<Args, E, F> Strategy<Args> for Whole<E, F>
where
    Args: Arguments,
    E: Executor,
    F: Generator<Args>,
{
    type Output = F::Output;
    type Memo = ();

    fn generate(
        &self,
        snapshot: Args::Snapshot,
        _previous: Option<Arc<Commit<F::Output>>>,
        submit: Submit<F::Output>,
    ) {
        let function = Arc::clone(&self.function);
        self.executor.execute(Box::new(move || {
            let value = function.invoke(Args::refs(&snapshot));
            submit.commit(value, ());
        }));
    }
}

/// Combine the values of `dependencies` with `function`.
///
/// `dependencies` is a tuple of zero to six nodes; `function` takes one
/// reference per dependency. Dependents are notified only when the result
/// differs (`PartialEq`) from the previous one.
///
/// # Example
///
/// ```rust,ignore
/// let top = source(2);
/// let left = transform(|x: &i32| x + 1, (top.clone(),));
/// let right = transform(|x: &i32| x + 2, (top.clone(),));
/// let bottom = transform(|l: &i32, r: &i32| l * r, (left, right));
/// assert_eq!(*bottom.value()?, 12);
/// ```
pub fn transform<F, D>(function: F, dependencies: D) -> Derived<Produced<F, D::Values>>
where
    D: Dependencies,
    F: IntoExecuteOn<D::Values>,
    Produced<F, D::Values>: PartialEq,
{
    transform_with(function, dependencies, Equal)
}

/// [`transform`] with an explicit comparator.
pub fn transform_with<F, D, C>(
    function: F,
    dependencies: D,
    comparator: C,
) -> Derived<Produced<F, D::Values>>
where
    D: Dependencies,
    F: IntoExecuteOn<D::Values>,
    C: Comparator<Produced<F, D::Values>>,
{
    let (executor, function) = function.into_execute_on().into_parts();
    let strategy = Whole {
        executor,
        function: Arc::new(function),
    };
    derive(dependencies, strategy, comparator)
}
