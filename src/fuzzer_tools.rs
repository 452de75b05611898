use rand::prelude::*;
use crate::history::{Update, UpdateMeta};
use crate::op::Op;
use crate::session::DocSession;
use crate::ranges::{ChangeOp, Metadata, Ranges};

const UCHARS: [char; 19] = [
    'a', 'b', 'c', '1', '2', '3', ' ', '\n', // ASCII
    '©', '¥', '½', // The Latin-1 suppliment (U+80 - U+ff)
    'Ύ', 'Δ', 'δ', // Greek (U+0370 - U+03FF)
    '←', '↯', // Arrows (U+2190 – U+21FF)
    '𐆐', '𐆔', '𐆘', // Ancient roman symbols (U+10190 – U+101CF)
];

pub(crate) fn random_str(len: usize, rng: &mut SmallRng) -> String {
    (0..len).map(|_| UCHARS[rng.gen_range(0..UCHARS.len())]).collect()
}

const USERS: [&str; 3] = ["alice", "bob", "carol"];

/// Make a random op which is valid against the session's current document.
pub(crate) fn make_random_op(session: &DocSession, rng: &mut SmallRng) -> Op {
    let doc = session.content();
    let doc_len = doc.len_chars();
    let insert_weight = if doc_len < 100 { 0.55 } else { 0.45 };

    // Sometimes put back text from a tracked delete.
    let deletes: Vec<_> = session.ranges().changes().iter().filter(|c| c.op.is_delete()).collect();
    if !deletes.is_empty() && rng.gen_bool(0.1) {
        let target = deletes[rng.gen_range(0..deletes.len())];
        let len = rng.gen_range(1..=target.op.len());
        let content: String = target.op.content.chars().take(len).collect();
        return Op::new_reject_insert(target.op.pos, &content);
    }

    if doc_len > 0 && rng.gen_bool(0.05) {
        let pos = rng.gen_range(0..doc_len);
        let span = rng.gen_range(1..=usize::min(10, doc_len - pos));
        let content: String = doc.slice_chars(pos..pos + span).collect();
        return Op::Comment { pos, content: content.into(), thread: None };
    }

    if doc_len == 0 || rng.gen_bool(insert_weight) {
        let pos = rng.gen_range(0..=doc_len);
        let len: usize = rng.gen_range(1..4);
        let content = random_str(len, rng);
        // Undo inserts which don't match anything behave like plain inserts.
        if rng.gen_bool(0.1) {
            Op::new_reject_insert(pos, &content)
        } else {
            Op::new_insert(pos, &content)
        }
    } else {
        let pos = rng.gen_range(0..doc_len);
        let span = rng.gen_range(1..=usize::min(10, doc_len - pos));
        let content: String = doc.slice_chars(pos..pos + span).collect();
        Op::new_delete(pos, &content)
    }
}

pub(crate) fn make_random_update(session: &DocSession, rng: &mut SmallRng) -> Update {
    let user = USERS[rng.gen_range(0..USERS.len())];
    let meta = UpdateMeta {
        tc: if rng.gen_bool(0.5) { Some("tc".into()) } else { None },
        ..UpdateMeta::for_user(user)
    };
    Update::new(session.version(), vec![make_random_op(session, rng)], meta)
}

/// Put another user's tracked delete right on top of an existing one. Ops alone rarely build
/// these: a tracked delete swallows any delete it touches.
pub(crate) fn seed_coincident_delete(session: &mut DocSession, rng: &mut SmallRng) {
    let existing: Vec<_> = session.ranges().changes().iter()
        .filter(|c| c.op.is_delete())
        .map(|c| (c.op.pos, c.metadata.user_id.clone()))
        .collect();
    if existing.is_empty() { return; }

    let (pos, user) = &existing[rng.gen_range(0..existing.len())];
    let others: Vec<&str> = USERS.iter().copied()
        .filter(|u| user.as_deref() != Some(*u))
        .collect();
    let other = others[rng.gen_range(0..others.len())];
    let len = rng.gen_range(1..4);
    let content = random_str(len, rng);
    session.ranges_mut().add_change(ChangeOp::new_delete(*pos, &content), &Metadata::for_user(other));
}

fn session_fuzz(seed: u64, n: usize, verbose: bool) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut session = DocSession::new("", 0, Ranges::default());
    session.ranges_mut().set_id_seed("000000000000000000");

    for _i in 0..n {
        let update = make_random_update(&session, &mut rng);
        if verbose { println!("i {} {} {:?}", _i, update.ops[0], update.meta.user_id); }

        session.apply_update(update).unwrap();
        session.ranges().dbg_check(&session.text());

        if rng.gen_bool(0.05) {
            seed_coincident_delete(&mut session, &mut rng);
        }

        // Occasionally accept some changes, like a user clicking through the review panel.
        if rng.gen_bool(0.02) {
            let ids: Vec<_> = session.ranges().changes().iter()
                .filter(|c| c.op.is_insert())
                .map(|c| c.id.clone())
                .collect();
            session.ranges_mut().remove_change_ids(&ids);
        }

        if rng.gen_bool(0.05) {
            session.take_pending_updates();
        }
    }

    assert_eq!(session.version(), n as u64);
}

#[test]
fn session_fuzz_once() {
    session_fuzz(321, 200, true);
}

#[test]
fn session_fuzz_many() {
    for seed in 0..50 {
        session_fuzz(seed, 300, false);
    }
}

#[test]
#[ignore]
fn session_fuzz_forever() {
    for seed in 0.. {
        if seed % 100 == 0 { println!("seed {seed}"); }
        session_fuzz(seed, 300, false);
    }
}
