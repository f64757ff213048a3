//! NeuQuant : quantification couleur par réseau de neurones auto-organisé
//! (Anthony Dekker, 1994). Produit 256 couleurs représentatives d'un flux
//! de triplets RGB.

use gc_core::error::GcError;

const NETSIZE: usize = 256;
const MAXNETPOS: usize = NETSIZE - 1;

// Primes proches de 500 : le pas d'échantillonnage doit être premier avec
// la taille de l'image.
const PRIME1: usize = 499;
const PRIME2: usize = 491;
const PRIME3: usize = 487;
const PRIME4: usize = 503;
const MINPICTUREBYTES: usize = 3 * PRIME4;

const NETBIASSHIFT: i32 = 4;
const NCYCLES: i32 = 100;

const INTBIASSHIFT: i32 = 16;
const INTBIAS: i32 = 1 << INTBIASSHIFT;
const GAMMASHIFT: i32 = 10;
const BETASHIFT: i32 = 10;
const BETA: i32 = INTBIAS >> BETASHIFT;
const BETAGAMMA: i32 = INTBIAS << (GAMMASHIFT - BETASHIFT);

const INITRAD: usize = NETSIZE >> 3;
const RADIUSBIASSHIFT: i32 = 6;
const RADIUSBIAS: i32 = 1 << RADIUSBIASSHIFT;
const INITRADIUS: i32 = (INITRAD as i32) * RADIUSBIAS;
const RADIUSDEC: i32 = 30;

const ALPHABIASSHIFT: i32 = 10;
const INITALPHA: i32 = 1 << ALPHABIASSHIFT;

const RADBIASSHIFT: i32 = 8;
const RADBIAS: i32 = 1 << RADBIASSHIFT;
const ALPHARADBSHIFT: i32 = ALPHABIASSHIFT + RADBIASSHIFT;
const ALPHARADBIAS: i32 = 1 << ALPHARADBSHIFT;

/// Réseau entraîné sur un flux de triplets RGB.
///
/// Cycle de vie : `train` (construction) → `color_map`/`map`. Une instance
/// par image ; jamais partagée.
///
/// # Example
/// ```
/// use gc_gif::NeuQuant;
/// let pixels = vec![0u8; 3 * 16];
/// let nq = NeuQuant::train(&pixels, 10).unwrap();
/// assert_eq!(nq.color_map().len(), 768);
/// assert_eq!(&nq.color_map()[..3], &[0, 0, 0]);
/// ```
pub struct NeuQuant {
    /// 256 échantillons (r, g, b, index d'origine), triés par vert après
    /// `inxbuild`.
    network: Vec<[i32; 4]>,
    /// Index accéléré sur le canal vert.
    netindex: [i32; 256],
    bias: [i32; NETSIZE],
    freq: [i32; NETSIZE],
    radpower: [i32; INITRAD],
}

impl NeuQuant {
    /// Entraîne un réseau sur `pixels` (triplets RGB consécutifs).
    ///
    /// `samplefac` ∈ [1, 30] : 1 = meilleure qualité, 30 = le plus rapide.
    ///
    /// # Errors
    /// `GcError::Quantize` when the buffer cannot form one full sample.
    pub fn train(pixels: &[u8], samplefac: u32) -> Result<Self, GcError> {
        if pixels.len() < 3 {
            return Err(GcError::Quantize(format!(
                "{} octet(s), il en faut au moins 3",
                pixels.len()
            )));
        }
        let samplefac = samplefac.clamp(1, 30) as i32;

        let mut nq = Self {
            network: (0..NETSIZE)
                .map(|i| {
                    let v = ((i << (NETBIASSHIFT + 8)) / NETSIZE) as i32;
                    [v, v, v, 0]
                })
                .collect(),
            netindex: [0; 256],
            bias: [0; NETSIZE],
            freq: [INTBIAS / NETSIZE as i32; NETSIZE],
            radpower: [0; INITRAD],
        };
        nq.learn(pixels, samplefac);
        nq.unbias();
        nq.inxbuild();
        Ok(nq)
    }

    /// Boucle d'apprentissage principale.
    fn learn(&mut self, pixels: &[u8], samplefac: i32) {
        // Le parcours par pas suppose des triplets entiers.
        let lengthcount = pixels.len() - pixels.len() % 3;
        let samplefac = if lengthcount < MINPICTUREBYTES {
            1
        } else {
            samplefac
        };
        let alphadec = 30 + (samplefac - 1) / 3;
        let samplepixels = (lengthcount / (3 * samplefac as usize)).max(1);
        let delta = ((samplepixels as i32) / NCYCLES).max(1);
        let mut alpha = INITALPHA;
        let mut radius = INITRADIUS;

        let mut rad = (radius >> RADIUSBIASSHIFT) as usize;
        if rad <= 1 {
            rad = 0;
        }
        self.fill_radpower(rad, alpha);

        log::trace!("apprentissage NeuQuant : {samplepixels} échantillons, facteur {samplefac}");

        let step = if lengthcount < MINPICTUREBYTES {
            3
        } else if lengthcount % PRIME1 != 0 {
            3 * PRIME1
        } else if lengthcount % PRIME2 != 0 {
            3 * PRIME2
        } else if lengthcount % PRIME3 != 0 {
            3 * PRIME3
        } else {
            3 * PRIME4
        };

        let mut pix = 0usize;
        let mut i = 0usize;
        while i < samplepixels {
            let r = i32::from(pixels[pix]) << NETBIASSHIFT;
            let g = i32::from(pixels[pix + 1]) << NETBIASSHIFT;
            let b = i32::from(pixels[pix + 2]) << NETBIASSHIFT;
            let j = self.contest(r, g, b);

            self.altersingle(alpha, j, r, g, b);
            if rad != 0 {
                self.alterneigh(rad, j, r, g, b);
            }

            pix += step;
            if pix >= lengthcount {
                pix -= lengthcount;
            }

            i += 1;
            if i % delta as usize == 0 {
                alpha -= alpha / alphadec;
                radius -= radius / RADIUSDEC;
                rad = (radius >> RADIUSBIASSHIFT) as usize;
                if rad <= 1 {
                    rad = 0;
                }
                self.fill_radpower(rad, alpha);
            }
        }
    }

    fn fill_radpower(&mut self, rad: usize, alpha: i32) {
        let radsq = (rad * rad) as i32;
        for (m, slot) in self.radpower.iter_mut().enumerate().take(rad) {
            *slot = alpha * (((radsq - (m * m) as i32) * RADBIAS) / radsq);
        }
    }

    /// Cherche le neurone gagnant : distance L1 minimale, ajustée par le
    /// biais pour favoriser les neurones peu utilisés. Décroît les
    /// fréquences, renforce le gagnant.
    fn contest(&mut self, r: i32, g: i32, b: i32) -> usize {
        let mut bestd = i32::MAX;
        let mut bestbiasd = i32::MAX;
        let mut bestpos = 0usize;
        let mut bestbiaspos = 0usize;

        for i in 0..NETSIZE {
            let n = &self.network[i];
            let dist = (n[0] - r).abs() + (n[1] - g).abs() + (n[2] - b).abs();
            if dist < bestd {
                bestd = dist;
                bestpos = i;
            }
            let biasdist = dist - (self.bias[i] >> (INTBIASSHIFT - NETBIASSHIFT));
            if biasdist < bestbiasd {
                bestbiasd = biasdist;
                bestbiaspos = i;
            }
            let betafreq = self.freq[i] >> BETASHIFT;
            self.freq[i] -= betafreq;
            self.bias[i] += betafreq << GAMMASHIFT;
        }
        self.freq[bestpos] += BETA;
        self.bias[bestpos] -= BETAGAMMA;
        bestbiaspos
    }

    /// Tire le neurone `i` vers (r, g, b) d'un facteur `alpha/INITALPHA`.
    fn altersingle(&mut self, alpha: i32, i: usize, r: i32, g: i32, b: i32) {
        let n = &mut self.network[i];
        n[0] -= alpha * (n[0] - r) / INITALPHA;
        n[1] -= alpha * (n[1] - g) / INITALPHA;
        n[2] -= alpha * (n[2] - b) / INITALPHA;
    }

    /// Tire les voisins de `i` dans le rayon `rad`, pondérés par `radpower`.
    fn alterneigh(&mut self, rad: usize, i: usize, r: i32, g: i32, b: i32) {
        let lo = (i as i32 - rad as i32).max(-1);
        let hi = ((i + rad) as i32).min(NETSIZE as i32);

        let mut j = i as i32 + 1;
        let mut k = i as i32 - 1;
        let mut m = 1usize;
        while j < hi || k > lo {
            let a = self.radpower[m];
            m += 1;
            if j < hi {
                let n = &mut self.network[j as usize];
                n[0] -= a * (n[0] - r) / ALPHARADBIAS;
                n[1] -= a * (n[1] - g) / ALPHARADBIAS;
                n[2] -= a * (n[2] - b) / ALPHARADBIAS;
                j += 1;
            }
            if k > lo {
                let n = &mut self.network[k as usize];
                n[0] -= a * (n[0] - r) / ALPHARADBIAS;
                n[1] -= a * (n[1] - g) / ALPHARADBIAS;
                n[2] -= a * (n[2] - b) / ALPHARADBIAS;
                k -= 1;
            }
        }
    }

    /// Dé-biaise le réseau (retour à [0, 255]) et enregistre l'index
    /// d'origine dans la quatrième voie.
    fn unbias(&mut self) {
        for (i, n) in self.network.iter_mut().enumerate() {
            n[0] >>= NETBIASSHIFT;
            n[1] >>= NETBIASSHIFT;
            n[2] >>= NETBIASSHIFT;
            n[3] = i as i32;
        }
    }

    /// Trie le réseau par canal vert et construit `netindex` : pour chaque
    /// valeur de vert, l'indice du premier échantillon de vert ≥ g.
    fn inxbuild(&mut self) {
        let mut previouscol = 0i32;
        let mut startpos = 0usize;

        for i in 0..NETSIZE {
            let mut smallpos = i;
            let mut smallval = self.network[i][1];
            for j in (i + 1)..NETSIZE {
                if self.network[j][1] < smallval {
                    smallpos = j;
                    smallval = self.network[j][1];
                }
            }
            if i != smallpos {
                self.network.swap(i, smallpos);
            }
            let smallval = self.network[i][1];
            if smallval != previouscol {
                self.netindex[previouscol as usize] = ((startpos + i) >> 1) as i32;
                for j in (previouscol + 1)..smallval {
                    self.netindex[j as usize] = i as i32;
                }
                previouscol = smallval;
                startpos = i;
            }
        }
        self.netindex[previouscol as usize] = ((startpos + MAXNETPOS) >> 1) as i32;
        for j in (previouscol + 1)..256 {
            self.netindex[j as usize] = MAXNETPOS as i32;
        }
    }

    /// Table de couleurs : 768 octets `R₀ G₀ B₀ R₁ G₁ B₁ …` dans l'ordre
    /// des index d'origine.
    #[must_use]
    pub fn color_map(&self) -> Vec<u8> {
        let mut index = [0usize; NETSIZE];
        for (pos, n) in self.network.iter().enumerate() {
            index[n[3] as usize] = pos;
        }
        let mut map = Vec::with_capacity(NETSIZE * 3);
        for slot in index {
            let n = &self.network[slot];
            map.push(n[0].clamp(0, 255) as u8);
            map.push(n[1].clamp(0, 255) as u8);
            map.push(n[2].clamp(0, 255) as u8);
        }
        map
    }

    /// Index (d'origine) de la couleur du réseau la plus proche de (r, g, b).
    ///
    /// Parcours bidirectionnel depuis `netindex[g]` : une direction est
    /// abandonnée dès que `|Δg|` dépasse la meilleure distance connue.
    #[must_use]
    pub fn map(&self, r: u8, g: u8, b: u8) -> usize {
        let r = i32::from(r);
        let g = i32::from(g);
        let b = i32::from(b);

        let mut bestd = 1000i32;
        let mut best = 0usize;
        let mut i = self.netindex[g as usize];
        let mut j = i - 1;

        while i < NETSIZE as i32 || j >= 0 {
            if i < NETSIZE as i32 {
                let n = &self.network[i as usize];
                let mut dist = n[1] - g;
                if dist >= bestd {
                    // Plus rien de mieux dans cette direction.
                    i = NETSIZE as i32;
                } else {
                    i += 1;
                    dist = dist.abs() + (n[0] - r).abs();
                    if dist < bestd {
                        dist += (n[2] - b).abs();
                        if dist < bestd {
                            bestd = dist;
                            best = n[3] as usize;
                        }
                    }
                }
            }
            if j >= 0 {
                let n = &self.network[j as usize];
                let mut dist = g - n[1];
                if dist >= bestd {
                    j = -1;
                } else {
                    j -= 1;
                    dist = dist.abs() + (n[0] - r).abs();
                    if dist < bestd {
                        dist += (n[2] - b).abs();
                        if dist < bestd {
                            bestd = dist;
                            best = n[3] as usize;
                        }
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_stream(colors: &[(u8, u8, u8)], repeat: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..repeat {
            for &(r, g, b) in colors {
                out.extend_from_slice(&[r, g, b]);
            }
        }
        out
    }

    #[test]
    fn too_small_buffer_is_quantize_error() {
        assert!(matches!(
            NeuQuant::train(&[0, 0], 10),
            Err(GcError::Quantize(_))
        ));
    }

    #[test]
    fn monochrome_black_sits_at_index_zero() {
        let pixels = rgb_stream(&[(0, 0, 0)], 64);
        let nq = NeuQuant::train(&pixels, 10).unwrap();
        let map = nq.color_map();
        assert_eq!(map.len(), 768);
        assert_eq!(&map[..3], &[0, 0, 0]);
        let idx = nq.map(0, 0, 0);
        assert_eq!(&map[idx * 3..idx * 3 + 3], &[0, 0, 0]);
    }

    #[test]
    fn map_points_into_color_map() {
        let pixels = rgb_stream(&[(255, 0, 0), (0, 255, 0), (0, 0, 255)], 400);
        let nq = NeuQuant::train(&pixels, 1).unwrap();
        let map = nq.color_map();
        for &(r, g, b) in &[(255u8, 0u8, 0u8), (0, 255, 0), (0, 0, 255)] {
            let idx = nq.map(r, g, b);
            assert!(idx < 256);
            let (mr, mg, mb) = (map[idx * 3], map[idx * 3 + 1], map[idx * 3 + 2]);
            let dist = (i32::from(mr) - i32::from(r)).abs()
                + (i32::from(mg) - i32::from(g)).abs()
                + (i32::from(mb) - i32::from(b)).abs();
            assert!(dist < 96, "({r},{g},{b}) mappé trop loin : ({mr},{mg},{mb})");
        }
    }

    #[test]
    fn netindex_walk_matches_exhaustive_search() {
        let pixels = rgb_stream(&[(10, 200, 30), (200, 10, 30), (30, 30, 200)], 300);
        let nq = NeuQuant::train(&pixels, 3).unwrap();
        let map = nq.color_map();
        for &(r, g, b) in &[(10u8, 200u8, 30u8), (128, 128, 128), (0, 0, 0)] {
            let idx = nq.map(r, g, b);
            let via_map = |i: usize| {
                (i32::from(map[i * 3]) - i32::from(r)).abs()
                    + (i32::from(map[i * 3 + 1]) - i32::from(g)).abs()
                    + (i32::from(map[i * 3 + 2]) - i32::from(b)).abs()
            };
            let best = (0..256).map(via_map).min().unwrap();
            assert_eq!(via_map(idx), best);
        }
    }

    #[test]
    fn tiny_image_forces_unit_sampling() {
        // Smaller than 3·503 bytes: stride 3, samplefac forced to 1.
        let pixels = rgb_stream(&[(40, 80, 120)], 16);
        let nq = NeuQuant::train(&pixels, 30).unwrap();
        let idx = nq.map(40, 80, 120);
        let map = nq.color_map();
        let (r, g, b) = (map[idx * 3], map[idx * 3 + 1], map[idx * 3 + 2]);
        let dist = (i32::from(r) - 40).abs() + (i32::from(g) - 80).abs() + (i32::from(b) - 120).abs();
        assert!(dist < 48, "couleur dominante mal apprise : ({r},{g},{b})");
    }
}
