//! Tensor views, operations and failure diagnostics.
//!
//! This example demonstrates:
//! - Deriving permuted and sliced views that share storage
//! - Materializing views with `dupe` and `contiguous`
//! - Elementwise operations and reductions
//! - How failures propagate and print
//!
//! Run with:
//! ```bash
//! cargo run --example views
//! ```

use tenview_core::{ops, Context, Tensor};

fn main() -> anyhow::Result<()> {
    println!("=== tenview: Views and Operations ===\n");

    let ctx = Context::new();

    example_views(&ctx)?;
    example_ops(&ctx)?;
    example_failures(&ctx);

    println!("\n=== All examples completed successfully! ===");
    Ok(())
}

fn example_views(ctx: &Context) -> anyhow::Result<()> {
    println!("--- Example 1: Views Share Storage ---");

    let t = Tensor::range(ctx, 0.0, 1.0, &[3, 4]);
    println!("Source [3, 4]:\n{t}");

    let p = t.permute(0, 1);
    println!("Permuted, shape {:?}, stride {:?}:\n{p}", p.shape(), p.stride());

    let s = t.slice(&[1, 1], &[3, 3]);
    println!("Slice [1..3, 1..3], offset {:?}:\n{s}", s.offset());

    s.set(&[0, 0], 100.0)?;
    println!("After writing 100 through the slice, source[1, 1] = {}", t.get(&[1, 1])?);

    let c = p.contiguous().into_result()?;
    println!(
        "Contiguous copy of the permuted view, stride {:?}, shares storage: {}\n",
        c.stride(),
        c.shares_storage_with(&t)
    );
    Ok(())
}

fn example_ops(ctx: &Context) -> anyhow::Result<()> {
    println!("--- Example 2: Operations ---");

    let a = Tensor::random(ctx, 0.0, 1.0, &[2, 3]);
    let b = Tensor::create(ctx, 10.0, &[2, 3]);

    let sum = ops::add(ctx, &a, &b).into_result()?;
    println!("a + 10:\n{sum}");

    let scaled = ops::vmul(ctx, 2.0, &sum).into_result()?;
    println!("2 * (a + 10):\n{scaled}");

    let rows = ops::reduce(ctx, &scaled, 1, ops::scalar::max).into_result()?;
    println!("Row maxima:\n{rows}");
    Ok(())
}

fn example_failures(ctx: &Context) {
    println!("--- Example 3: Failure Propagation ---");

    let t = Tensor::alloc(ctx, &[2, 2]);
    let bad = t.slice(&[0, 1], &[2, 5]);
    let worse = ops::vadd(ctx, 1.0, &bad.contiguous());

    print!("{worse}");
    if let Some(failure) = worse.failure() {
        println!("kind: {}, chain length: {}", failure.kind(), failure.messages().len());
    }
}
