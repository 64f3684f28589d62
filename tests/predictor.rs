use primix::Predictor;

fn feed_byte(p: &mut Predictor, byte: u8) -> [f32; 8] {
    let mut probs = [0.0; 8];
    for i in 0..8 {
        let bit = (byte >> (7 - i)) & 1;
        probs[i] = p.predict();
        p.perceive(bit);
    }
    probs
}

/// Likelihood the predictor assigns to `byte` appearing next, obtained by
/// chaining the eight conditional bit probabilities. Advances the
/// predictor past the byte.
fn byte_likelihood(p: &mut Predictor, byte: u8) -> f64 {
    let mut likelihood = 1.0f64;
    for i in 0..8 {
        let bit = (byte >> (7 - i)) & 1;
        let pr = p.predict() as f64;
        likelihood *= if bit == 1 { pr } else { 1.0 - pr };
        p.perceive(bit);
    }
    likelihood
}

#[test]
fn a_single_letter_round() {
    let mut p = Predictor::new([true; 256]).unwrap();
    let probs = feed_byte(&mut p, 0x41);
    for pr in probs {
        assert!(pr.is_finite());
        assert!((0.0..=1.0).contains(&pr));
    }
    // the next byte starts cleanly
    let pr = p.predict();
    assert!(pr > 0.0 && pr < 1.0);
}

#[test]
fn constant_zeros_converge() {
    let mut p = Predictor::new([true; 256]).unwrap();
    let mut last = [0.0f32; 8];
    for _ in 0..256 {
        last = feed_byte(&mut p, 0x00);
    }
    for pr in last {
        assert!(pr < 0.01, "p(1) = {pr}, expected the 0-bit above 0.99");
    }
}

#[test]
fn brackets_prefer_the_matching_closer() {
    let prime = |p: &mut Predictor| {
        for _ in 0..50 {
            feed_byte(p, b'(');
            feed_byte(p, b')');
        }
        feed_byte(p, b'(');
    };
    let mut a = Predictor::new([true; 256]).unwrap();
    let mut b = Predictor::new([true; 256]).unwrap();
    prime(&mut a);
    prime(&mut b);
    let matching = byte_likelihood(&mut a, b')');
    let mismatching = byte_likelihood(&mut b, b']');
    assert!(
        matching > mismatching,
        "P(')') = {matching:e} should beat P(']') = {mismatching:e}"
    );
}

#[test]
fn runs_are_deterministic() {
    let text = b"Determinism: the same bytes must yield the same probabilities. (2026)";
    let mut a = Predictor::new([true; 256]).unwrap();
    let mut b = Predictor::new([true; 256]).unwrap();
    for &byte in text.iter() {
        for i in 0..8 {
            let bit = (byte >> (7 - i)) & 1;
            let pa = a.predict();
            let pb = b.predict();
            assert_eq!(pa.to_bits(), pb.to_bits());
            a.perceive(bit);
            b.perceive(bit);
        }
    }
}

#[test]
fn prefix_probabilities_are_independent_of_the_suffix() {
    let text = b"prefix independence prefix independence";
    let prefix = 16usize;

    let mut full = Predictor::new([true; 256]).unwrap();
    let mut recorded = Vec::new();
    for (i, &byte) in text.iter().enumerate() {
        for j in 0..8 {
            let bit = (byte >> (7 - j)) & 1;
            let pr = full.predict();
            if i < prefix {
                recorded.push(pr);
            }
            full.perceive(bit);
        }
    }

    let mut replay = Predictor::new([true; 256]).unwrap();
    let mut k = 0;
    for &byte in text.iter().take(prefix) {
        for j in 0..8 {
            let bit = (byte >> (7 - j)) & 1;
            assert_eq!(replay.predict().to_bits(), recorded[k].to_bits());
            replay.perceive(bit);
            k += 1;
        }
    }
}

#[test]
fn single_symbol_vocabulary_short_circuits() {
    let byte = b'Q';
    let mut vocab = [false; 256];
    vocab[byte as usize] = true;
    let mut p = Predictor::new(vocab).unwrap();
    for _ in 0..4 {
        for i in 0..8 {
            let bit = (byte >> (7 - i)) & 1;
            assert_eq!(p.predict(), bit as f32);
            p.perceive(bit);
        }
    }
}

#[test]
fn repeated_text_becomes_predictable() {
    let text = b"the quick brown fox jumps over the lazy dog. ";
    let mut p = Predictor::new([true; 256]).unwrap();
    let mut cost_first = 0.0f64;
    let mut cost_last = 0.0f64;
    for round in 0..12 {
        let mut cost = 0.0f64;
        for &byte in text.iter() {
            for i in 0..8 {
                let bit = (byte >> (7 - i)) & 1;
                let pr = p.predict() as f64;
                let pr_bit = if bit == 1 { pr } else { 1.0 - pr };
                cost -= pr_bit.max(1.0e-9).log2();
                p.perceive(bit);
            }
        }
        if round == 0 {
            cost_first = cost;
        }
        cost_last = cost;
    }
    // the ensemble should compress the repeated sentence far below its
    // first-pass cost
    assert!(
        cost_last < cost_first / 2.0,
        "first pass {cost_first:.1} bits, last pass {cost_last:.1} bits"
    );
}

#[test]
fn statistics_accessors_report_the_roster() {
    let mut p = Predictor::new([true; 256]).unwrap();
    assert_eq!(p.num_models(), 130);
    let before = p.num_neurons();
    feed_byte(&mut p, b'x');
    // lazily allocated mixer rows only grow
    assert!(p.num_neurons() >= before);
    assert!(p.num_connections() > 0);
}
