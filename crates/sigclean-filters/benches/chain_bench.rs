//! Throughput benchmarks for the filter chain
//!
//! Target: an 8-channel stream at 250 Hz must cost a tiny fraction of one
//! core; per-sample cost should stay well under a microsecond.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sigclean_core::{SampleBlock, StreamMetadata};
use sigclean_filters::{ChainConfig, ChannelFilterBank, ChannelFilterChain, SignalProcessor, Stage};

fn test_signal(len: usize, sample_rate: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate;
            20.0 * (2.0 * std::f32::consts::PI * 10.0 * t).sin()
                + 5.0 * (2.0 * std::f32::consts::PI * 50.0 * t).sin()
                + 300.0
        })
        .collect()
}

/// Per-sample cost of a single chain under different stage sets
fn bench_chain_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_apply");
    let input = test_signal(4096, 250.0);
    group.throughput(Throughput::Elements(input.len() as u64));

    let configs = [
        ("passthrough", ChainConfig::passthrough(250.0)),
        ("default", ChainConfig::default()),
        ("eeg_display", ChainConfig::eeg_display(250.0)),
        (
            "all_stages",
            ChainConfig::eeg_display(250.0)
                .with_outlier_trim(50.0)
                .with_stage(Stage::Smoothing, true)
                .with_lowpass(100.0),
        ),
    ];

    for (name, config) in configs {
        let mut chain = ChannelFilterChain::new(config).unwrap();
        group.bench_with_input(BenchmarkId::new("4096_samples", name), &input, |b, input| {
            b.iter(|| {
                let mut acc = 0.0;
                for &x in input {
                    acc += chain.apply(black_box(x));
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

/// Whole-block processing across channel counts
fn bench_bank_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank_process");

    for channels in [1usize, 8, 32] {
        let metadata = StreamMetadata::eeg(250.0, channels).unwrap();
        let per_channel = test_signal(250, 250.0);
        let block = SampleBlock::from_channels(&vec![per_channel; channels], metadata).unwrap();
        let mut bank = ChannelFilterBank::new(ChainConfig::eeg_display(250.0), channels).unwrap();

        group.throughput(Throughput::Elements(block.len() as u64));
        group.bench_with_input(BenchmarkId::new("one_second", channels), &block, |b, block| {
            b.iter(|| black_box(bank.process(black_box(block)).unwrap()));
        });
    }

    group.finish();
}

/// Cost of a full reconfigure, which redesigns every section
fn bench_reconfigure(c: &mut Criterion) {
    let mut chain = ChannelFilterChain::new(ChainConfig::eeg_display(250.0)).unwrap();
    let mut upper = 40.0;

    c.bench_function("chain_reconfigure", |b| {
        b.iter(|| {
            upper = if upper > 44.0 { 40.0 } else { upper + 0.5 };
            chain.set_bandpass_edges(black_box(3.0), black_box(upper)).unwrap();
        });
    });
}

criterion_group!(benches, bench_chain_apply, bench_bank_process, bench_reconfigure);
criterion_main!(benches);
