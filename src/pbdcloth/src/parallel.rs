// Fork-join helpers: rayon in release, plain iteration in debug so that
// debug runs are reproducible and steppable.

#[cfg(not(debug_assertions))]
pub fn for_each_mut<T, F>(items: &mut [T], f: F)
where
	T: Send,
	F: Fn(usize, &mut T) + Sync + Send,
{
	use rayon::prelude::*;
	items
		.par_iter_mut()
		.enumerate()
		.for_each(|(i, item)| f(i, item));
}

#[cfg(debug_assertions)]
pub fn for_each_mut<T, F>(items: &mut [T], f: F)
where
	T: Send,
	F: Fn(usize, &mut T) + Sync + Send,
{
	items.iter_mut().enumerate().for_each(|(i, item)| f(i, item));
}

#[cfg(not(debug_assertions))]
pub fn map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
	T: Sync,
	R: Send,
	F: Fn(&T) -> R + Sync + Send,
{
	use rayon::prelude::*;
	items.par_iter().map(f).collect()
}

#[cfg(debug_assertions)]
pub fn map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
	T: Sync,
	R: Send,
	F: Fn(&T) -> R + Sync + Send,
{
	items.iter().map(f).collect()
}
