// DMC ------------------------------------------------------------------------------------------------------------------------------- DMC

/// Counts must reach this much evidence on both sides before a state is
/// cloned.
const CLONE_MIN: f32 = 2.0;

#[derive(Clone, Copy)]
struct DmcNode {
    next: [u32; 2],
    count: [f32; 2],
}

/// Dynamic Markov coder: a bit-level finite state machine grown by
/// cloning. The machine starts as a byte-aligned binary tree whose
/// leaves loop back to the root; heavily used transitions split off
/// private copies of their target so long-range structure accretes.
pub struct Dmc {
    nodes: Vec<DmcNode>,
    cur: usize,
    smooth: f32,
    max_nodes: usize,
}

impl Dmc {
    pub fn new(smooth: f32, size: u64) -> Dmc {
        let max_nodes = (size / 16).min(crate::MEM_CAP) as usize;
        let mut dmc = Dmc {
            nodes: Vec::with_capacity(max_nodes),
            cur: 1,
            smooth,
            max_nodes,
        };
        dmc.reset();
        dmc
    }

    fn reset(&mut self) {
        self.nodes.clear();
        // byte-aligned tree rooted at node 1; the deepest level wraps
        // back to the root so every eighth bit restarts the byte
        for i in 0..256usize {
            let next = |b: usize| {
                let t = 2 * i + b;
                if t < 256 { t.max(1) as u32 } else { 1 }
            };
            self.nodes.push(DmcNode {
                next: [next(0), next(1)],
                count: [0.1, 0.1],
            });
        }
        self.cur = 1;
    }

    pub fn predict(&mut self) -> f32 {
        let n = self.nodes[self.cur];
        (n.count[1] + self.smooth) / (n.count[0] + n.count[1] + 2.0 * self.smooth)
    }

    pub fn perceive(&mut self, bit: u8) {
        let b = bit as usize;
        let target = self.nodes[self.cur].next[b] as usize;
        let from = self.nodes[self.cur].count[b];
        let target_total = self.nodes[target].count[0] + self.nodes[target].count[1];

        if from > CLONE_MIN && target_total - from > CLONE_MIN {
            if self.nodes.len() >= self.max_nodes {
                self.reset();
                return;
            }
            let r = from / target_total;
            let mut clone = self.nodes[target];
            clone.count[0] *= r;
            clone.count[1] *= r;
            let idx = self.nodes.len() as u32;
            self.nodes[target].count[0] -= clone.count[0];
            self.nodes[target].count[1] -= clone.count[1];
            self.nodes[self.cur].next[b] = idx;
            self.nodes.push(clone);
            self.nodes[self.cur].count[b] += 1.0;
            self.cur = idx as usize;
        } else {
            self.nodes[self.cur].count[b] += 1.0;
            self.cur = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_a_constant_stream() {
        let mut m = Dmc::new(0.02, 1 << 20);
        for _ in 0..2000 {
            m.predict();
            m.perceive(1);
        }
        assert!(m.predict() > 0.9);
    }

    #[test]
    fn probabilities_stay_strict() {
        let mut m = Dmc::new(0.02, 1 << 16);
        for i in 0..5000u32 {
            let p = m.predict();
            assert!(p > 0.0 && p < 1.0);
            m.perceive(((i * 7 + i / 3) & 1) as u8);
        }
    }
}
