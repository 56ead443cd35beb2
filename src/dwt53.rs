//! 1-D lifting kernels for the reversible integer 5/3 filter.
//!
//! All coefficient arithmetic is wrapping so that adversarial codestreams
//! cannot trigger overflow UB; the `wrap_add`/`wrap_sub` helpers are the
//! only add/sub used on sample values.
//!
//! Rows and columns are stored sub-band deinterleaved: the `sn` low-pass
//! samples first, then the `dn` high-pass samples. The fused kernels
//! interleave and lift in one streaming pass; [`idwt53_interleaved`] is
//! the windowed two-pass schedule operating on an already-interleaved
//! buffer, and doubles as the reference the fused variants are checked
//! against.

pub(crate) fn wrap_add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

pub(crate) fn wrap_sub(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

/// Inverse transform of one deinterleaved row, fused interleave+lift.
/// `row` holds `sn` low-pass then `len - sn` high-pass samples; on return
/// it holds the reconstructed samples in spatial order.
pub(crate) fn idwt53_row(row: &mut [i32], tmp: &mut [i32], sn: usize, cas: u32) {
    let len = row.len();
    if cas == 0 {
        if len > 1 {
            idwt53_h_cas0(row, tmp, sn);
        }
    } else if len == 1 {
        row[0] /= 2;
    } else if len == 2 {
        let even = row[sn];
        let odd = row[0];
        let o1 = wrap_sub(odd, wrap_add(even, 1) >> 1);
        row[0] = wrap_add(even, o1);
        row[1] = o1;
    } else {
        idwt53_h_cas1(row, tmp, sn);
    }
}

fn idwt53_h_cas0(row: &mut [i32], tmp: &mut [i32], sn: usize) {
    let len = row.len();
    let mut s1n = row[0];
    let mut d1n = row[sn];
    let mut s0n = wrap_sub(s1n, wrap_add(d1n, 1) >> 1);

    let mut i = 0;
    let mut j = 1;
    while i + 3 < len {
        let d1c = d1n;
        let s0c = s0n;
        s1n = row[j];
        d1n = row[sn + j];
        s0n = wrap_sub(s1n, wrap_add(wrap_add(d1c, d1n), 2) >> 2);
        tmp[i] = s0c;
        tmp[i + 1] = wrap_add(d1c, wrap_add(s0c, s0n) >> 1);
        i += 2;
        j += 1;
    }
    tmp[i] = s0n;

    if len & 1 == 1 {
        tmp[len - 1] = wrap_sub(row[(len - 1) / 2], wrap_add(d1n, 1) >> 1);
        tmp[len - 2] = wrap_add(d1n, wrap_add(s0n, tmp[len - 1]) >> 1);
    } else {
        tmp[len - 1] = wrap_add(d1n, s0n);
    }

    row.copy_from_slice(&tmp[..len]);
}

fn idwt53_h_cas1(row: &mut [i32], tmp: &mut [i32], sn: usize) {
    let len = row.len();
    // The interleaved even positions hold the high-pass samples, stored
    // after the sn low-pass samples.
    let high = sn;

    let mut s1 = row[high + 1];
    let mut dc = wrap_sub(row[0], wrap_add(wrap_add(row[high], s1), 2) >> 2);
    tmp[0] = wrap_add(row[high], dc);

    let mut i = 1;
    let mut j = 1;
    let bound = len - 2 - (1 - (len & 1));
    while i < bound {
        let s2 = row[high + j + 1];
        let dn = wrap_sub(row[j], wrap_add(wrap_add(s1, s2), 2) >> 2);
        tmp[i] = dc;
        tmp[i + 1] = wrap_add(s1, wrap_add(dn, dc) >> 1);
        dc = dn;
        s1 = s2;
        i += 2;
        j += 1;
    }
    tmp[i] = dc;

    if len & 1 == 0 {
        let dn = wrap_sub(row[len / 2 - 1], wrap_add(s1, 1) >> 1);
        tmp[len - 2] = wrap_add(s1, wrap_add(dn, dc) >> 1);
        tmp[len - 1] = dn;
    } else {
        tmp[len - 1] = wrap_add(s1, dc);
    }

    row.copy_from_slice(&tmp[..len]);
}

/// Windowed inverse lifting on an interleaved buffer. With full windows
/// this is the textbook two-pass schedule and must agree bit-for-bit with
/// the fused kernels; the partial transform drives it with sub-band
/// windows.
pub(crate) fn idwt53_interleaved(
    a: &mut [i32],
    sn: usize,
    dn: usize,
    cas: u32,
    win_l: (u32, u32),
    win_h: (u32, u32),
) {
    if cas == 0 {
        if !(dn > 0 || sn > 1) {
            return;
        }
        let d_idx = |i: isize| 2 * i.clamp(0, dn as isize - 1) as usize + 1;
        let s_idx = |i: isize| 2 * i.clamp(0, sn as isize - 1) as usize;
        for i in win_l.0 as isize..win_l.1 as isize {
            let v = wrap_add(wrap_add(a[d_idx(i - 1)], a[d_idx(i)]), 2) >> 2;
            a[2 * i as usize] = wrap_sub(a[2 * i as usize], v);
        }
        for i in win_h.0 as isize..win_h.1 as isize {
            let v = wrap_add(a[s_idx(i)], a[s_idx(i + 1)]) >> 1;
            a[2 * i as usize + 1] = wrap_add(a[2 * i as usize + 1], v);
        }
    } else if sn == 0 && dn == 1 {
        a[0] /= 2;
    } else {
        // The low-pass samples occupy the odd interleaved positions.
        let ss_idx = |i: isize| 2 * i.clamp(0, dn as isize - 1) as usize;
        let dd_idx = |i: isize| 2 * i.clamp(0, sn as isize - 1) as usize + 1;
        for i in win_l.0 as isize..win_l.1 as isize {
            let v = wrap_add(wrap_add(a[ss_idx(i)], a[ss_idx(i + 1)]), 2) >> 2;
            a[2 * i as usize + 1] = wrap_sub(a[2 * i as usize + 1], v);
        }
        for i in win_h.0 as isize..win_h.1 as isize {
            let v = wrap_add(a[dd_idx(i)], a[dd_idx(i - 1)]) >> 1;
            a[2 * i as usize] = wrap_add(a[2 * i as usize], v);
        }
    }
}

type Lanes = [i32; 8];

fn load(rows: &[&mut [i32]], y: usize, col0: usize, nb: usize) -> Lanes {
    let mut v = [0i32; 8];
    v[..nb].copy_from_slice(&rows[y][col0..col0 + nb]);
    v
}

fn store(rows: &mut [&mut [i32]], y: usize, col0: usize, nb: usize, v: Lanes) {
    rows[y][col0..col0 + nb].copy_from_slice(&v[..nb]);
}

fn ladd(a: Lanes, b: Lanes) -> Lanes {
    core::array::from_fn(|i| a[i].wrapping_add(b[i]))
}

fn lsub(a: Lanes, b: Lanes) -> Lanes {
    core::array::from_fn(|i| a[i].wrapping_sub(b[i]))
}

fn ladd_k(a: Lanes, k: i32) -> Lanes {
    core::array::from_fn(|i| a[i].wrapping_add(k))
}

fn lshr(a: Lanes, s: u32) -> Lanes {
    core::array::from_fn(|i| a[i] >> s)
}

fn put(tmp: &mut [i32], slot: usize, v: Lanes) {
    tmp[slot * 8..slot * 8 + 8].copy_from_slice(&v);
}

fn get(tmp: &[i32], slot: usize) -> Lanes {
    let mut v = [0i32; 8];
    v.copy_from_slice(&tmp[slot * 8..slot * 8 + 8]);
    v
}

/// Inverse transform of up to 8 adjacent columns, fused interleave+lift
/// through the 8-lane scratch. `rows[y]` covers the processed column
/// range; the column span starts at `col0`.
pub(crate) fn idwt53_v(
    rows: &mut [&mut [i32]],
    col0: usize,
    nb: usize,
    sn: usize,
    cas: u32,
    tmp: &mut [i32],
) {
    let len = rows.len();
    if cas == 0 {
        if len > 1 {
            idwt53_v_cas0(rows, col0, nb, sn, tmp);
        }
    } else if len == 1 {
        for v in rows[0][col0..col0 + nb].iter_mut() {
            *v /= 2;
        }
    } else if len == 2 {
        let even = load(rows, sn, col0, nb);
        let odd = load(rows, 0, col0, nb);
        let o1 = lsub(odd, lshr(ladd_k(even, 1), 1));
        store(rows, 0, col0, nb, ladd(even, o1));
        store(rows, 1, col0, nb, o1);
    } else {
        idwt53_v_cas1(rows, col0, nb, sn, tmp);
    }
}

fn idwt53_v_cas0(rows: &mut [&mut [i32]], col0: usize, nb: usize, sn: usize, tmp: &mut [i32]) {
    let len = rows.len();
    let mut s1n = load(rows, 0, col0, nb);
    let mut d1n = load(rows, sn, col0, nb);
    let mut s0n = lsub(s1n, lshr(ladd_k(d1n, 1), 1));

    let mut i = 0;
    let mut j = 1;
    while i + 3 < len {
        let d1c = d1n;
        let s0c = s0n;
        s1n = load(rows, j, col0, nb);
        d1n = load(rows, sn + j, col0, nb);
        s0n = lsub(s1n, lshr(ladd_k(ladd(d1c, d1n), 2), 2));
        put(tmp, i, s0c);
        put(tmp, i + 1, ladd(d1c, lshr(ladd(s0c, s0n), 1)));
        i += 2;
        j += 1;
    }
    put(tmp, i, s0n);

    if len & 1 == 1 {
        let last = lsub(load(rows, (len - 1) / 2, col0, nb), lshr(ladd_k(d1n, 1), 1));
        put(tmp, len - 1, last);
        put(tmp, len - 2, ladd(d1n, lshr(ladd(s0n, last), 1)));
    } else {
        put(tmp, len - 1, ladd(d1n, s0n));
    }

    for y in 0..len {
        store(rows, y, col0, nb, get(tmp, y));
    }
}

fn idwt53_v_cas1(rows: &mut [&mut [i32]], col0: usize, nb: usize, sn: usize, tmp: &mut [i32]) {
    let len = rows.len();
    let high = sn;

    let mut s1 = load(rows, high + 1, col0, nb);
    let d0 = load(rows, high, col0, nb);
    let mut dc = lsub(
        load(rows, 0, col0, nb),
        lshr(ladd_k(ladd(d0, s1), 2), 2),
    );
    put(tmp, 0, ladd(d0, dc));

    let mut i = 1;
    let mut j = 1;
    let bound = len - 2 - (1 - (len & 1));
    while i < bound {
        let s2 = load(rows, high + j + 1, col0, nb);
        let dn = lsub(load(rows, j, col0, nb), lshr(ladd_k(ladd(s1, s2), 2), 2));
        put(tmp, i, dc);
        put(tmp, i + 1, ladd(s1, lshr(ladd(dn, dc), 1)));
        dc = dn;
        s1 = s2;
        i += 2;
        j += 1;
    }
    put(tmp, i, dc);

    if len & 1 == 0 {
        let dn = lsub(load(rows, len / 2 - 1, col0, nb), lshr(ladd_k(s1, 1), 1));
        put(tmp, len - 2, ladd(s1, lshr(ladd(dn, dc), 1)));
        put(tmp, len - 1, dn);
    } else {
        put(tmp, len - 1, ladd(s1, dc));
    }

    for y in 0..len {
        store(rows, y, col0, nb, get(tmp, y));
    }
}

/// Windowed inverse lifting on the 8-lane interleaved scratch used by the
/// partial vertical pass. Slot `i` holds 8 adjacent columns of
/// interleaved row `i`.
pub(crate) fn idwt53_partial_cols(
    tmp: &mut [i32],
    sn: usize,
    dn: usize,
    cas: u32,
    win_l: (u32, u32),
    win_h: (u32, u32),
) {
    if cas == 0 {
        if !(dn > 0 || sn > 1) {
            return;
        }
        let d_slot = |i: isize| 2 * i.clamp(0, dn as isize - 1) as usize + 1;
        let s_slot = |i: isize| 2 * i.clamp(0, sn as isize - 1) as usize;
        for i in win_l.0 as isize..win_l.1 as isize {
            let v = lshr(ladd_k(ladd(get(tmp, d_slot(i - 1)), get(tmp, d_slot(i))), 2), 2);
            put(tmp, 2 * i as usize, lsub(get(tmp, 2 * i as usize), v));
        }
        for i in win_h.0 as isize..win_h.1 as isize {
            let v = lshr(ladd(get(tmp, s_slot(i)), get(tmp, s_slot(i + 1))), 1);
            let slot = 2 * i as usize + 1;
            put(tmp, slot, ladd(get(tmp, slot), v));
        }
    } else if sn == 0 && dn == 1 {
        for v in tmp[..8].iter_mut() {
            *v /= 2;
        }
    } else {
        let ss_slot = |i: isize| 2 * i.clamp(0, dn as isize - 1) as usize;
        let dd_slot = |i: isize| 2 * i.clamp(0, sn as isize - 1) as usize + 1;
        for i in win_l.0 as isize..win_l.1 as isize {
            let v = lshr(ladd_k(ladd(get(tmp, ss_slot(i)), get(tmp, ss_slot(i + 1))), 2), 2);
            let slot = 2 * i as usize + 1;
            put(tmp, slot, lsub(get(tmp, slot), v));
        }
        for i in win_h.0 as isize..win_h.1 as isize {
            let v = lshr(ladd(get(tmp, dd_slot(i)), get(tmp, dd_slot(i - 1))), 1);
            let slot = 2 * i as usize;
            put(tmp, slot, ladd(get(tmp, slot), v));
        }
    }
}

/// Forward transform of one spatial row, deinterleaving into `sn`
/// low-pass then `dn` high-pass samples.
pub(crate) fn fdwt53_row(row: &mut [i32], tmp: &mut [i32], even: bool) {
    let width = row.len();
    let sn = (width + usize::from(even)) / 2;
    let dn = width - sn;

    if width <= 1 {
        if width == 1 && !even {
            row[0] = wrap_add(row[0], row[0]);
        }
        return;
    }

    if even {
        for i in 0..dn {
            let right = if 2 * i + 2 < width { row[2 * i + 2] } else { row[2 * i] };
            tmp[sn + i] = wrap_sub(row[2 * i + 1], wrap_add(row[2 * i], right) >> 1);
        }
        for i in 0..sn {
            let dl = if i > 0 { tmp[sn + i - 1] } else { tmp[sn] };
            let dr = if i < dn { tmp[sn + i] } else { tmp[sn + dn - 1] };
            row[i] = wrap_add(row[2 * i], wrap_add(wrap_add(dl, dr), 2) >> 2);
        }
    } else {
        for i in 0..dn {
            let left = if i > 0 { row[2 * i - 1] } else { row[1] };
            let right = if 2 * i + 1 < width { row[2 * i + 1] } else { row[2 * i - 1] };
            tmp[sn + i] = wrap_sub(row[2 * i], wrap_add(left, right) >> 1);
        }
        for i in 0..sn {
            let dl = tmp[sn + i];
            let dr = if i + 1 < dn { tmp[sn + i + 1] } else { tmp[sn + dn - 1] };
            row[i] = wrap_add(row[2 * i + 1], wrap_add(wrap_add(dl, dr), 2) >> 2);
        }
    }

    row[sn..].copy_from_slice(&tmp[sn..sn + dn]);
}

/// Forward transform of up to 8 adjacent columns, deinterleaving `sn`
/// low-pass rows then `dn` high-pass rows back at tile stride.
pub(crate) fn fdwt53_v(
    rows: &mut [&mut [i32]],
    col0: usize,
    nb: usize,
    even: bool,
    tmp: &mut [i32],
) {
    let len = rows.len();
    let sn = (len + usize::from(even)) / 2;
    let dn = len - sn;

    if len <= 1 {
        if len == 1 && !even {
            for v in rows[0][col0..col0 + nb].iter_mut() {
                *v = v.wrapping_add(*v);
            }
        }
        return;
    }

    if even {
        for i in 0..dn {
            let right = if 2 * i + 2 < len {
                load(rows, 2 * i + 2, col0, nb)
            } else {
                load(rows, 2 * i, col0, nb)
            };
            let d = lsub(
                load(rows, 2 * i + 1, col0, nb),
                lshr(ladd(load(rows, 2 * i, col0, nb), right), 1),
            );
            put(tmp, i, d);
        }
        for i in 0..sn {
            let dl = if i > 0 { get(tmp, i - 1) } else { get(tmp, 0) };
            let dr = if i < dn { get(tmp, i) } else { get(tmp, dn - 1) };
            let s = ladd(
                load(rows, 2 * i, col0, nb),
                lshr(ladd_k(ladd(dl, dr), 2), 2),
            );
            store(rows, i, col0, nb, s);
        }
    } else {
        for i in 0..dn {
            let left = if i > 0 {
                load(rows, 2 * i - 1, col0, nb)
            } else {
                load(rows, 1, col0, nb)
            };
            let right = if 2 * i + 1 < len {
                load(rows, 2 * i + 1, col0, nb)
            } else {
                load(rows, 2 * i - 1, col0, nb)
            };
            let d = lsub(load(rows, 2 * i, col0, nb), lshr(ladd(left, right), 1));
            put(tmp, i, d);
        }
        for i in 0..sn {
            let dl = get(tmp, i);
            let dr = if i + 1 < dn { get(tmp, i + 1) } else { get(tmp, dn - 1) };
            let s = ladd(
                load(rows, 2 * i + 1, col0, nb),
                lshr(ladd_k(ladd(dl, dr), 2), 2),
            );
            store(rows, i, col0, nb, s);
        }
    }

    for i in 0..dn {
        store(rows, sn + i, col0, nb, get(tmp, i));
    }
}
