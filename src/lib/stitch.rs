use log::warn;

pub trait Coincident {
    fn coincides(&self, other: &Self, epsilon: f64) -> bool;
}

impl Coincident for (f64, f64) {
    fn coincides(&self, other: &Self, epsilon: f64) -> bool {
        (self.0 - other.0).abs() < epsilon && (self.1 - other.1).abs() < epsilon
    }
}

#[derive(PartialEq, Debug)]
enum Connection {
    Tail,
    Head,
    ReverseTail,
    ReverseHead,
}

trait Prependable<T> {
    fn prepend(&mut self, other: &[T]);
    fn reverse_prepend(&mut self, other: &[T]);
    fn reverse_extend(&mut self, other: &[T]);
}

impl<T: Copy> Prependable<T> for Vec<T> {
    fn prepend(&mut self, other: &[T]) {
        for element in other.iter().rev() {
            self.insert(0, *element);
        }
    }

    fn reverse_prepend(&mut self, other: &[T]) {
        for element in other {
            self.insert(0, *element);
        }
    }

    fn reverse_extend(&mut self, other: &[T]) {
        self.extend(other.iter().rev());
    }
}

fn connection<T: Coincident>(ring: &[T], fragment: &[T], epsilon: f64) -> Option<Connection> {
    use Connection::*;

    let ring_first = ring.first()?;
    let ring_last = ring.last()?;
    let first = fragment.first()?;
    let last = fragment.last()?;
    if ring_last.coincides(first, epsilon) {
        Some(Tail)
    } else if ring_last.coincides(last, epsilon) {
        Some(ReverseTail)
    } else if ring_first.coincides(last, epsilon) {
        Some(Head)
    } else if ring_first.coincides(first, epsilon) {
        Some(ReverseHead)
    } else {
        None
    }
}

fn attach<T: Copy>(ring: &mut Vec<T>, fragment: &[T], connection: Connection) {
    use Connection::*;

    match connection {
        Tail => ring.extend(&fragment[1..]),
        ReverseTail => ring.reverse_extend(&fragment[..fragment.len() - 1]),
        Head => ring.prepend(&fragment[..fragment.len() - 1]),
        ReverseHead => ring.reverse_prepend(&fragment[1..]),
    }
}

/// Merges open fragments into closed rings.
///
/// A ring is grown from the first unused fragment until no other fragment
/// touches one of its ends. Rings that still don't close are closed by
/// joining their ends directly.
pub fn stitch_rings<T: Copy + Coincident + std::fmt::Debug>(
    fragments: Vec<Vec<T>>,
    epsilon: f64,
) -> Vec<Vec<T>> {
    let mut unused: Vec<Vec<T>> = fragments.into_iter().filter(|f| !f.is_empty()).collect();
    unused.reverse();

    let mut rings = vec![];
    while let Some(mut ring) = unused.pop() {
        loop {
            let found = unused
                .iter()
                .rposition(|fragment| connection(&ring, fragment, epsilon).is_some());
            let idx = match found {
                Some(idx) => idx,
                None => break,
            };
            let fragment = unused.remove(idx);
            if let Some(connection) = connection(&ring, &fragment, epsilon) {
                attach(&mut ring, &fragment, connection);
            }
        }

        if let (Some(&first), Some(last)) = (ring.first(), ring.last()) {
            if !first.coincides(last, epsilon) {
                warn!(
                    "force closing boundary ring of {} points, gap between {:?} and {:?}",
                    ring.len(),
                    last,
                    first
                );
                ring.push(first);
            }
        }
        rings.push(ring);
    }
    rings
}
