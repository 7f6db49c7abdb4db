mod common;

use common::spmd;
use dranges::{algorithms, views, Distribution, DistributedRange, DistributedVector, Segmented};

#[test]
fn test_reduce_iota_sum_on_root() -> anyhow::Result<()> {
    let out = spmd(4, |ctx| {
        let mut v = DistributedVector::<i32>::new(ctx, 10)?;
        algorithms::iota(ctx, &mut v, 100);
        Ok(algorithms::reduce(ctx, 0, &v, 0, |a, b| a + b))
    })?;
    assert_eq!(out, vec![1045, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_reduce_empty_range_returns_init_on_root() -> anyhow::Result<()> {
    let out = spmd(3, |ctx| {
        let v = DistributedVector::<u64>::new(ctx, 0)?;
        Ok(algorithms::reduce(ctx, 1, &v, 7, |a, b| a + b))
    })?;
    assert_eq!(out, vec![0, 7, 0]);
    Ok(())
}

#[test]
fn test_all_reduce_delivers_everywhere() -> anyhow::Result<()> {
    let out = spmd(3, |ctx| {
        let v = DistributedVector::from_elem(ctx, 11, 2u32, Distribution::default())?;
        Ok(algorithms::all_reduce(ctx, &v, 1, |a, b| a * b))
    })?;
    assert_eq!(out, vec![2048; 3]);
    Ok(())
}

#[test]
fn test_dot_product_of_aligned_and_unaligned_vectors() -> anyhow::Result<()> {
    let out = spmd(4, |ctx| {
        let mut a = DistributedVector::<i64>::new(ctx, 16)?;
        let mut b = DistributedVector::<i64>::new(ctx, 16)?;
        let mut c = DistributedVector::<i64>::with_distribution(ctx, 16, Distribution::new().granularity(3))?;
        algorithms::iota(ctx, &mut a, 1);
        algorithms::fill(ctx, &mut b, 2);
        algorithms::fill(ctx, &mut c, 2);
        let aligned = algorithms::reduce(ctx, 0, views::transform(views::zip(&a, &b), |(x, y)| x * y), 0, |p, q| p + q);
        let unaligned = algorithms::reduce(ctx, 0, views::transform(views::zip(&a, &c), |(x, y)| x * y), 0, |p, q| p + q);
        Ok((aligned, unaligned))
    })?;
    assert_eq!(out[0], (272, 272));
    assert!(out[1..].iter().all(|&r| r == (0, 0)));
    Ok(())
}

#[test]
fn test_transform_fallback_matches_aligned_path() -> anyhow::Result<()> {
    let out = spmd(4, |ctx| {
        let mut input = DistributedVector::<i32>::new(ctx, 13)?;
        algorithms::iota(ctx, &mut input, -4);

        let mut same = DistributedVector::<i32>::new(ctx, 13)?;
        let mut other = DistributedVector::<i32>::with_distribution(ctx, 13, Distribution::new().granularity(5))?;
        assert!(dranges::aligned(&[&input, &same]));
        assert!(!dranges::aligned(&[&input, &other]));

        algorithms::transform(ctx, &input, &mut same, |x| x * 3 + 1);
        algorithms::transform(ctx, &input, &mut other, |x| x * 3 + 1);

        let mut a = vec![0; 13];
        let mut b = vec![0; 13];
        algorithms::copy_to_root(ctx, 0, &same, &mut a);
        algorithms::copy_to_root(ctx, 0, &other, &mut b);
        Ok((a, b))
    })?;
    let expected: Vec<i32> = (-4..9).map(|x| x * 3 + 1).collect();
    assert_eq!(out[0].0, expected);
    assert_eq!(out[0].1, expected);
    Ok(())
}

#[test]
fn test_transform_over_shifted_views() -> anyhow::Result<()> {
    let out = spmd(3, |ctx| {
        let mut input = DistributedVector::<u16>::new(ctx, 9)?;
        let mut output = DistributedVector::<u16>::new(ctx, 9)?;
        algorithms::iota(ctx, &mut input, 0);
        algorithms::transform(ctx, views::drop(&input, 2), views::take(&mut output, 7), |x| x + 100);
        Ok(algorithms::gather(ctx, 0, &output))
    })?;
    assert_eq!(out[0], Some(vec![102, 103, 104, 105, 106, 107, 108, 0, 0]));
    assert_eq!(out[1], None);
    Ok(())
}

#[test]
fn test_copy_between_distributions() -> anyhow::Result<()> {
    let out = spmd(2, |ctx| {
        let mut src = DistributedVector::<f64>::new(ctx, 5)?;
        let mut dst = DistributedVector::<f64>::with_distribution(ctx, 5, Distribution::new().granularity(4))?;
        algorithms::iota(ctx, &mut src, 0.5);
        algorithms::copy(ctx, &src, &mut dst);
        Ok((0..5).map(|i| dst.get(i)).collect::<Vec<_>>())
    })?;
    for values in out {
        assert_eq!(values, vec![0.5, 1.5, 2.5, 3.5, 4.5]);
    }
    Ok(())
}

#[test]
fn test_for_each_visits_every_local_element_once() -> anyhow::Result<()> {
    let out = spmd(3, |ctx| {
        let mut v = DistributedVector::<u8>::new(ctx, 20)?;
        algorithms::for_each(ctx, &mut v, |x| *x += 1);
        algorithms::for_each(ctx, views::enumerate(&mut v), |(i, x)| *x += (i % 2) as u8);
        Ok(algorithms::gather(ctx, 2, &v))
    })?;
    let expected: Vec<u8> = (0..20).map(|i| 1 + (i % 2) as u8).collect();
    assert_eq!(out[2], Some(expected));
    Ok(())
}

#[test]
fn test_scatter_gather_round_trip() -> anyhow::Result<()> {
    let data: Vec<u32> = (0..23).map(|i| i * i).collect();
    let out = spmd(4, |ctx| {
        let mut v = DistributedVector::<u32>::with_distribution(ctx, 23, Distribution::new().granularity(2))?;
        let src = if ctx.rank() == 3 { &data[..] } else { &[][..] };
        algorithms::scatter(ctx, 3, src, &mut v);
        let local_ok = v.local_slice() == &data[v.local_segment().offset()..v.local_segment().end()];
        Ok((local_ok, algorithms::gather(ctx, 1, &v)))
    })?;
    assert!(out.iter().all(|(ok, _)| *ok));
    assert_eq!(out[1].1.as_deref(), Some(&data[..]));
    Ok(())
}

#[test]
fn test_copy_from_root_then_to_root() -> anyhow::Result<()> {
    let out = spmd(3, |ctx| {
        let mut v = DistributedVector::<i16>::new(ctx, 8)?;
        let src: Vec<i16> = (10..18).collect();
        algorithms::copy_from_root(ctx, 2, &src, &mut v);
        let mut back = vec![0i16; 8];
        algorithms::copy_to_root(ctx, 0, &v, &mut back);
        Ok((v.local_slice().to_vec(), back))
    })?;
    assert_eq!(out[0].1, (10..18).collect::<Vec<i16>>());
    assert_eq!(out[1].0, vec![13, 14, 15]);
    assert_eq!(out[2].1, vec![0; 8]);
    Ok(())
}

#[test]
fn test_iota_on_subrange_uses_view_indices() -> anyhow::Result<()> {
    let out = spmd(2, |ctx| {
        let mut v = DistributedVector::<i64>::new(ctx, 6)?;
        algorithms::iota(ctx, views::subrange(&mut v, 1, 5), 10);
        Ok(algorithms::gather(ctx, 0, &v))
    })?;
    assert_eq!(out[0], Some(vec![0, 10, 11, 12, 13, 0]));
    Ok(())
}

#[test]
fn test_enumerate_is_aligned_with_its_range() -> anyhow::Result<()> {
    spmd(2, |ctx| {
        let v = DistributedVector::<u8>::new(ctx, 5)?;
        let e = views::enumerate(&v);
        assert_eq!(e.segments(), v.segments());
        assert_eq!(e.get(4), (4, 0));
        ctx.barrier();
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_copy_from_root_is_visible_in_every_open_container() -> anyhow::Result<()> {
    let out = spmd(4, |ctx| {
        let mut target = DistributedVector::<u32>::with_distribution(ctx, 10, Distribution::new().halo(1))?;
        let bystander = DistributedVector::from_elem(ctx, 6, 5u32, Distribution::default())?;
        let src: Vec<u32> = (1..=10).collect();
        algorithms::copy_from_root(ctx, 3, &src, &mut target);
        let local: u32 = target.local_slice().iter().sum();
        Ok((local, bystander.local_slice().to_vec()))
    })?;
    assert_eq!(out.iter().map(|(sum, _)| sum).sum::<u32>(), 55);
    assert_eq!(out[0], (1 + 2 + 3, vec![5, 5]));
    assert_eq!(out[3], (10, vec![]));
    Ok(())
}
