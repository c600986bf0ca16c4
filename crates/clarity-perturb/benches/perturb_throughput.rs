use clarity_perturb::{image_hash, CanonicalImage, PerturbationRegistry};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

fn source_image() -> CanonicalImage {
    let (width, height) = (128u32, 96u32);
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 2) as u8, (y * 2) as u8, ((x ^ y) & 0xff) as u8]);
        }
    }
    CanonicalImage::new(width, height, pixels).expect("bench image")
}

fn bench_perturbations(c: &mut Criterion) {
    let registry = PerturbationRegistry::builtin();
    let image = source_image();
    let cases = [
        ("brightness", json!(1.4)),
        ("contrast", json!(0.6)),
        ("gaussian_noise", json!(0.08)),
        ("blur", json!(1.5)),
        ("resize", json!(0.5)),
    ];
    for (name, value) in cases {
        let perturbation = registry
            .create_for_axis(name, &value, 4242)
            .expect("perturbation");
        c.bench_function(&format!("perturb_{name}"), |b| {
            b.iter(|| {
                let out = perturbation.apply(black_box(&image)).expect("apply");
                black_box(image_hash(&out));
            });
        });
    }
}

criterion_group!(benches, bench_perturbations);
criterion_main!(benches);
