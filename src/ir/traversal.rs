//! Ordered, rewrite-safe traversal of a program.
//!
//! Both passes visit every term exactly once, in an order where all
//! predecessors (operands for a forward pass, uses for a backward pass) are
//! visited first, even while the visitor inserts terms and redirects edges.
//!
//! Visitors may add new terms upstream of the current term (forward) or
//! downstream of it (backward). They must not make a term ready that is
//! neither a successor of the current term nor a newly created source/sink;
//! with such modifications some terms may never be visited.

use crate::ir::{Program, TermId, TermMap};
use log::trace;

fn successors(program: &Program, term: TermId, forward: bool) -> &[TermId] {
    if forward {
        program.term(term).uses()
    } else {
        program.term(term).operands()
    }
}

fn predecessors_done(
    program: &Program,
    processed: &TermMap<bool>,
    term: TermId,
    forward: bool,
) -> bool {
    let preds = if forward {
        program.term(term).operands()
    } else {
        program.term(term).uses()
    };
    preds.iter().all(|p| processed[*p])
}

fn traverse(
    program: &mut Program,
    forward: bool,
    mut visit: impl FnMut(&mut Program, TermId),
) {
    let mut ready = TermMap::<bool>::new();
    let mut processed = TermMap::<bool>::new();

    let mut ready_terms = if forward {
        program.sources()
    } else {
        program.sinks()
    };
    for &t in &ready_terms {
        ready[t] = true;
    }

    // Successors are remembered before the visit: if the visitor unlinks the
    // current term we would otherwise lose them. Duplicates are harmless.
    let mut check_list: Vec<TermId> = Vec::new();

    while let Some(term) = ready_terms.pop() {
        // A ready term can be erased by the visit of an earlier term.
        if !program.is_live(term) {
            continue;
        }

        check_list.clear();
        check_list.extend_from_slice(successors(program, term, forward));

        trace!("Processing {}", program.display_term(term));
        visit(program, term);
        processed[term] = true;

        // The visit may have introduced new sources or sinks.
        let leaves = if forward {
            program.sources()
        } else {
            program.sinks()
        };
        for leaf in leaves {
            if !ready[leaf] {
                ready_terms.push(leaf);
                ready[leaf] = true;
            }
        }

        // And new successors of the current term.
        if program.is_live(term) {
            check_list.extend_from_slice(successors(program, term, forward));
        }

        for i in 0..check_list.len() {
            let succ = check_list[i];
            if program.is_live(succ)
                && !ready[succ]
                && predecessors_done(program, &processed, succ, forward)
            {
                ready_terms.push(succ);
                ready[succ] = true;
            }
        }
    }
}

/// Visit every term, operands before users.
pub fn forward_pass(program: &mut Program, visit: impl FnMut(&mut Program, TermId)) {
    traverse(program, true, visit)
}

/// Visit every term, users before operands.
pub fn backward_pass(program: &mut Program, visit: impl FnMut(&mut Program, TermId)) {
    traverse(program, false, visit)
}
