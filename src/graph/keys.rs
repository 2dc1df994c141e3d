// src/graph/keys.rs

/// Source of keys for nodes created without an explicit one.
pub trait KeyGenerator: Send {
    fn next_key(&mut self) -> String;
}

/// Default generator: `node-0`, `node-1`, ...
#[derive(Debug, Default, Clone)]
pub struct SequentialKeys {
    next: u64,
}

impl KeyGenerator for SequentialKeys {
    fn next_key(&mut self) -> String {
        let key = format!("node-{}", self.next);
        self.next += 1;
        key
    }
}

impl<F> KeyGenerator for F
where
    F: FnMut() -> String + Send,
{
    fn next_key(&mut self) -> String {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_keys_count_up() {
        let mut keys = SequentialKeys::default();
        assert_eq!(keys.next_key(), "node-0");
        assert_eq!(keys.next_key(), "node-1");
    }

    #[test]
    fn closures_generate_keys() {
        let mut n = 10;
        let mut keys = move || {
            n += 1;
            format!("k{n}")
        };
        assert_eq!(KeyGenerator::next_key(&mut keys), "k11");
    }
}
