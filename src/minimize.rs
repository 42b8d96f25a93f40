//! MTDFA minimization by Moore partition refinement
//!
//! Every state is assigned a class; in each pass, each state's MTBDD
//! is rewritten so that a terminal `(dst, bit)` becomes
//! `(class[dst], bit)`, and states are regrouped by the resulting
//! signature.  Two pseudo-states stand for the constants `⊤` and `⊥`
//! so that states equivalent to them can be recognized and folded.

use crate::builder::cache::{size_estimate_unary, ApplyCache, OpTag};
use crate::repr::formula::Formula;
use crate::repr::mtbdd::BddId;
use crate::repr::mtdfa::Mtdfa;
use log::debug;
use rustc_hash::FxHashMap;

/// Minimize with a caller-provided cache; the compositional
/// translator reuses one cache across many minimizations, bumping
/// `iteration` instead of clearing.
pub(crate) fn minimize_core(dfa: &Mtdfa, cache: &mut ApplyCache, iteration: &mut u32) -> Mtdfa {
    if *iteration >= (1 << 20) {
        // bound the cache footprint over long compositions
        cache.reset();
        *iteration = 0;
    }

    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let n = dfa.num_roots();

    // classes[0..n] for the real states, plus the ⊤ pseudo-state at
    // index n and the ⊥ pseudo-state at n+1
    let mut classes: Vec<u32> = vec![0; n + 2];

    let mut signatures: Vec<BddId> = Vec::with_capacity(n + 2);
    let mut groups: FxHashMap<BddId, Vec<usize>> = FxHashMap::default();
    // (tt, ⊥) and (ff, ⊤) leaves force the pseudo-states to keep a
    // real state number
    let mut accepting_false_seen = false;
    let mut rejecting_true_seen = false;

    loop {
        *iteration += 1;
        let true_term = mgr.terminal(2 * classes[n] + 1);
        let false_term = mgr.terminal(2 * classes[n + 1]);
        accepting_false_seen = false;
        rejecting_true_seen = false;
        for (i, &state) in dfa.states.iter().enumerate() {
            let sig = mgr.mt_apply1(
                state,
                cache,
                OpTag::Rename,
                *iteration,
                false_term,
                true_term,
                &mut |_, v| {
                    let accepting = v & 1;
                    let class = classes[(v / 2) as usize];
                    if class == n as u32 + accepting {
                        if accepting == 1 {
                            accepting_false_seen = true;
                        } else {
                            rejecting_true_seen = true;
                        }
                    }
                    2 * class + accepting
                },
            );
            let group = groups.entry(sig).or_default();
            if group.is_empty() {
                signatures.push(sig);
            }
            group.push(i);
        }
        // the pseudo-states come last, in case their signature also
        // belongs to real states
        for (sig, idx) in [(true_term, n), (false_term, n + 1)] {
            let group = groups.entry(sig).or_default();
            if group.is_empty() {
                signatures.push(sig);
            }
            group.push(idx);
        }

        // Reassign classes in signature discovery order, so that the
        // class holding state 0 is always class 0.  A group holding a
        // pseudo-state keeps the pseudo-class number.
        let mut curclass: u32 = 0;
        let mut changed = false;
        for &sig in &signatures {
            let mut mapclass = curclass;
            curclass += 1;
            let group = &groups[&sig];
            let back = *group.last().expect("nonempty group");
            if back >= n {
                mapclass = back as u32;
            }
            for &i in group {
                if classes[i] != mapclass {
                    changed = true;
                    classes[i] = mapclass;
                }
            }
        }
        if !changed {
            break;
        }
        debug!("refinement pass produced {} classes", signatures.len());
        groups.clear();
        signatures.clear();
    }

    // The signatures of the last pass are the new MTBDDs, minus the
    // pseudo-state terminals, which fold back into the constants.
    // Careful: true_term/false_term only replace (tt,⊤)/(ff,⊥); the
    // states for (tt,⊥) or (ff,⊤) must survive when referenced.
    let want_names = dfa.names.len() == n;
    let mut names: Vec<Formula> = Vec::new();
    let sz = signatures.len();
    let mut j: u32 = 0;
    *iteration += 1;
    let true_term = mgr.terminal(2 * classes[n] + 1);
    let false_term = mgr.terminal(2 * classes[n + 1]);
    let mut need_remap = false;
    let mut i = 0;
    while i < sz {
        let mut sig = signatures[i];
        let group = &groups[&sig];
        let back = *group.last().expect("nonempty group");
        if back == n + 1 {
            // the class is equivalent to ⊥
            if i == 0 {
                debug_assert_eq!(group[0], 0);
                if want_names {
                    names.push(Formula::ff());
                }
                signatures[0] = BddId::FALSE;
                j = 1;
                break;
            }
            if !accepting_false_seen {
                i += 1;
                continue;
            }
            // (ff,⊤) occurs somewhere: ⊥ needs a state number
            classes[n + 1] = j;
            need_remap = true;
        }
        if back == n {
            if i == 0 {
                debug_assert_eq!(group[0], 0);
                if want_names {
                    names.push(Formula::tt());
                }
                signatures[0] = BddId::TRUE;
                j = 1;
                break;
            }
            if !rejecting_true_seen {
                i += 1;
                continue;
            }
            classes[n] = j;
            need_remap = true;
        }
        if want_names {
            // any member can label the class; pick the first, or the
            // constant itself when the class is a lone pseudo-state
            names.push(match group.iter().find(|&&m| m < n) {
                Some(&m) => dfa.names[m].clone(),
                None if back == n => Formula::tt(),
                None => Formula::ff(),
            });
        }
        sig = mgr.mt_terminal_to_const(sig, false_term, true_term, cache, *iteration);
        classes[i] = j;
        if i as u32 != j {
            need_remap = true;
        }
        signatures[j as usize] = sig;
        j += 1;
        i += 1;
    }
    signatures.truncate(j as usize);

    // fill the holes left by skipped ⊤/⊥ classes
    if need_remap {
        *iteration += 1;
        for sig in signatures.iter_mut() {
            *sig = mgr.mt_apply1(
                *sig,
                cache,
                OpTag::Rename,
                *iteration,
                BddId::FALSE,
                BddId::TRUE,
                &mut |_, v| 2 * classes[(v / 2) as usize] + (v & 1),
            );
        }
    }

    let mut res = Mtdfa::new(&dict);
    let controllable = dfa.controllable_variables();
    if !(signatures[0].is_const() && controllable.is_true()) {
        res.aps = dfa.aps.clone();
    }
    res.set_controllable_variables(controllable);
    res.names = names;
    res.states = signatures;
    res
}

/// Return the minimal MTDFA for the same language.
pub fn minimize_mtdfa(dfa: &Mtdfa) -> Mtdfa {
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    let mut iteration = 0;
    minimize_core(dfa, &mut cache, &mut iteration)
}
